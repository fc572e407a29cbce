pub const MESSAGING_COMPONENT_NAME: &str = "messaging";

/// Absolute scope the worker registers under when app options omit one.
pub const DEFAULT_WORKER_SCOPE: &str = "https://app.hemolink.org/";

/// Offline assets pre-cached on worker install when app options omit a
/// manifest. The offline fallback page must stay in this list.
pub const DEFAULT_OFFLINE_ASSETS: &[&str] = &[
    "/",
    "/offline.html",
    "/manifest.json",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
];

pub const DEFAULT_CACHE_VERSION: &str = "v1";

/// Durable storage keys, scoped per browser profile.
pub const STORAGE_KEY_ASKED: &str = "hemolink.push.asked";
pub const STORAGE_KEY_ENABLED: &str = "hemolink.push.enabled";
pub const STORAGE_KEY_TOKEN: &str = "hemolink.push.token";

/// Bounded token acquisition: fixed attempt count with a fixed inter-attempt
/// delay. Deliberately not exponential.
pub const TOKEN_ACQUIRE_MAX_ATTEMPTS: u32 = 3;
pub const TOKEN_ACQUIRE_RETRY_DELAY_MS: u64 = 2_000;

/// Tokens older than this are re-minted on the next acquire.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Wait before the first opt-in prompt so the page is interactive.
pub const PROMPT_MOUNT_DELAY_MS: u64 = 3_000;
