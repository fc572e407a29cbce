use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_channel::Receiver;
use url::Url;

use crate::app::{self, registry, ClientApp};
use crate::component::types::{
    ComponentError, DynService, InstanceFactory, InstanceFactoryOptions,
};
use crate::component::{Component, ComponentContainer, InstantiationMode};
use crate::logger::Logger;
use crate::messaging::constants::{
    DEFAULT_CACHE_VERSION, DEFAULT_OFFLINE_ASSETS, DEFAULT_WORKER_SCOPE, MESSAGING_COMPONENT_NAME,
};
use crate::messaging::error::{
    internal_error, invalid_argument, permission_required, unsupported_environment,
    worker_unavailable, MessagingResult,
};
use crate::messaging::feed::FeedStore;
use crate::messaging::gateway::{LocalGateway, PushGateway};
use crate::messaging::permission::{
    NativeState, PermissionMachine, PermissionSnapshot, PromptOutcome,
};
use crate::messaging::rest::BackendClient;
use crate::messaging::router::{ForegroundRouter, ToastEvent};
use crate::messaging::token_manager::{AcquireOutcome, TokenManager, TokenTiming};
use crate::messaging::types::{MessageHandler, MessagePayload, Unsubscribe};
use crate::platform::memory::{MemoryPermission, MemoryStorage};
use crate::platform::web::{KeyValueStorage, PermissionSurface};
use crate::worker::{
    PageMessage, ProviderConfig, ServiceWorkerController, WorkerEnv, WorkerSignal,
};

/// Host seams and tuning for one [`Messaging`] instance.
///
/// [`MessagingDeps::memory`] is the default used by the component factory;
/// embedders binding a real host substitute their own implementations, and
/// tests script the surfaces.
pub struct MessagingDeps {
    pub storage: Arc<dyn KeyValueStorage>,
    pub permissions: Arc<dyn PermissionSurface>,
    pub gateway: Arc<dyn PushGateway>,
    pub worker_env: WorkerEnv,
    pub prompt_delay: Duration,
    pub timing: TokenTiming,
}

impl MessagingDeps {
    pub fn memory() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            permissions: Arc::new(MemoryPermission::new()),
            gateway: Arc::new(LocalGateway::new()),
            worker_env: WorkerEnv::memory(),
            prompt_delay: PermissionMachine::default_prompt_delay(),
            timing: TokenTiming::default(),
        }
    }
}

struct WorkerLink {
    page_id: String,
    signals: Receiver<WorkerSignal>,
    configured: bool,
}

/// Per-application facade over the push pipeline.
#[derive(Clone)]
pub struct Messaging {
    inner: Arc<MessagingInner>,
}

struct MessagingInner {
    app: ClientApp,
    permission: PermissionMachine,
    tokens: TokenManager,
    feed: FeedStore,
    router: ForegroundRouter,
    worker: ServiceWorkerController,
    worker_link: Mutex<Option<WorkerLink>>,
    provider_config: ProviderConfig,
    logger: Logger,
}

impl Messaging {
    /// Builds a messaging instance over explicit host seams.
    pub fn with_deps(app: ClientApp, deps: MessagingDeps) -> MessagingResult<Self> {
        app.check_destroyed()
            .map_err(|err| internal_error(err.to_string()))?;
        let options = app.options();

        let base_url = options
            .api_base_url
            .clone()
            .ok_or_else(|| invalid_argument("app options are missing the backend origin"))?;
        let session = options.session_token.clone().unwrap_or_default();
        let backend = Arc::new(BackendClient::new(&base_url, &session)?);

        let scope_raw = options
            .worker_scope
            .clone()
            .unwrap_or_else(|| DEFAULT_WORKER_SCOPE.to_string());
        let scope = Url::parse(&scope_raw)
            .map_err(|err| invalid_argument(format!("invalid worker scope '{scope_raw}': {err}")))?;
        let assets = options.offline_assets.clone().unwrap_or_else(|| {
            DEFAULT_OFFLINE_ASSETS
                .iter()
                .map(|asset| asset.to_string())
                .collect()
        });
        let cache_version = options
            .cache_version
            .clone()
            .unwrap_or_else(|| DEFAULT_CACHE_VERSION.to_string());

        let worker = ServiceWorkerController::new(deps.worker_env, scope, assets, cache_version)
            .map_err(|err| worker_unavailable(err.to_string()))?;

        let permission = PermissionMachine::bootstrap(
            deps.permissions,
            deps.storage.clone(),
            deps.prompt_delay,
        );

        let tokens = TokenManager::new(
            deps.gateway,
            backend.clone(),
            deps.storage,
            options.sender_id.clone().unwrap_or_default(),
            options.vapid_key.clone().unwrap_or_default(),
            deps.timing,
        );

        let feed = FeedStore::new(backend);
        let router = ForegroundRouter::new(feed.clone());

        let provider_config = ProviderConfig {
            api_key: None,
            sender_id: options.sender_id.clone(),
            vapid_key: options.vapid_key.clone(),
            app_id: options.app_id.clone(),
        };

        Ok(Self {
            inner: Arc::new(MessagingInner {
                app,
                permission,
                tokens,
                feed,
                router,
                worker,
                worker_link: Mutex::new(None),
                provider_config,
                logger: Logger::new("push-sdk"),
            }),
        })
    }

    pub fn app(&self) -> &ClientApp {
        &self.inner.app
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn feed(&self) -> &FeedStore {
        &self.inner.feed
    }

    pub fn router(&self) -> &ForegroundRouter {
        &self.inner.router
    }

    pub fn worker(&self) -> &ServiceWorkerController {
        &self.inner.worker
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    pub fn permission(&self) -> PermissionSnapshot {
        self.inner.permission.snapshot()
    }

    /// Mount-time prompt flow; policy decides whether a dialog appears.
    pub async fn maybe_prompt(&self) -> PromptOutcome {
        self.inner.permission.maybe_prompt().await
    }

    /// Installs the in-page handler for foreground push messages.
    pub fn on_message(&self, handler: MessageHandler) -> Unsubscribe {
        self.inner.router.on_message(handler)
    }

    /// Toast stream for the embedding UI.
    pub fn subscribe_toasts(&self) -> Receiver<ToastEvent> {
        self.inner.router.subscribe_toasts()
    }

    /// Entry point for provider bindings delivering a foreground message.
    pub fn dispatch_foreground(&self, payload: MessagePayload) {
        self.inner.router.deliver(payload);
    }

    /// User-initiated opt-in: resolves the native permission (prompting if
    /// undecided), flips the preference, waits for worker activation, and
    /// acquires + registers a device token. Failures surface as a toast in
    /// addition to the returned error.
    pub async fn enable_notifications(&self) -> MessagingResult<AcquireOutcome> {
        match self.enable_flow().await {
            Ok(outcome) => {
                if !outcome.backend_synced {
                    self.inner.router.emit_failure(
                        "Notifications partially enabled",
                        "this device is set up, but registration with the server is still pending",
                    );
                }
                Ok(outcome)
            }
            Err(err) => {
                self.inner
                    .router
                    .emit_failure("Could not enable notifications", &err.to_string());
                Err(err)
            }
        }
    }

    /// User-initiated opt-out: flips the preference, then releases the
    /// device token. Returns whether a token existed.
    pub async fn disable_notifications(&self) -> MessagingResult<bool> {
        let _ = self.inner.permission.set_enabled(false);
        match self.inner.tokens.release().await {
            Ok(existed) => Ok(existed),
            Err(err) => {
                self.inner
                    .router
                    .emit_failure("Could not disable notifications", &err.to_string());
                Err(err)
            }
        }
    }

    /// Passive page-load reconciliation: re-reads shared state and, when
    /// notifications are active, retries a pending backend registration and
    /// checks for missed notifications. Failures here are logged, never
    /// surfaced as toasts.
    pub async fn bootstrap(&self) -> PermissionSnapshot {
        self.inner.permission.refresh_native();
        let snapshot = self.inner.permission.snapshot();
        if !snapshot.is_active() {
            return snapshot;
        }

        if let Err(err) = self.ensure_worker_ready().await {
            self.inner
                .logger
                .warn(format!("worker not ready during bootstrap: {err}"));
            return snapshot;
        }

        match self.inner.tokens.ensure_registered().await {
            Ok(true) => self.inner.logger.info("pending token registration completed"),
            Ok(false) => {}
            Err(err) => self
                .inner
                .logger
                .warn(format!("background token registration failed: {err}")),
        }

        match self.inner.feed.check_missed().await {
            Ok(0) => {}
            Ok(missed) => self
                .inner
                .logger
                .info(format!("{missed} notification(s) arrived while away")),
            Err(err) => self
                .inner
                .logger
                .warn(format!("missed-notification check failed: {err}")),
        }

        snapshot
    }

    /// Waits until the worker is activated and configured. Token work must
    /// never start before the activation signal.
    pub async fn ensure_worker_ready(&self) -> MessagingResult<()> {
        {
            let mut link = self.inner.worker_link.lock().unwrap();
            if link.is_none() {
                let (page_id, signals) = self.inner.worker.connect_page();
                *link = Some(WorkerLink {
                    page_id,
                    signals,
                    configured: false,
                });
            }
        }

        let registration = self
            .inner
            .worker
            .register()
            .await
            .map_err(|err| worker_unavailable(err.to_string()))?;
        if !registration.is_active() {
            return Err(worker_unavailable("worker did not reach activation"));
        }

        let (page_id, signals, configured) = {
            let link = self.inner.worker_link.lock().unwrap();
            let link = link.as_ref().expect("worker link connected above");
            (link.page_id.clone(), link.signals.clone(), link.configured)
        };
        if configured {
            return Ok(());
        }

        self.inner
            .worker
            .handle_message(
                &page_id,
                PageMessage::ProviderConfig {
                    config: self.inner.provider_config.clone(),
                },
            )
            .await;

        // Drain broadcasts until the acknowledgement addressed to this page
        // arrives.
        loop {
            match signals.recv().await {
                Ok(WorkerSignal::ConfigReceived) => break,
                Ok(_) => continue,
                Err(_) => return Err(internal_error("worker signal channel closed")),
            }
        }

        if let Some(link) = self.inner.worker_link.lock().unwrap().as_mut() {
            link.configured = true;
        }
        Ok(())
    }

    async fn enable_flow(&self) -> MessagingResult<AcquireOutcome> {
        self.inner.permission.refresh_native();
        match self.inner.permission.snapshot().native {
            NativeState::Unsupported => {
                return Err(unsupported_environment(
                    "push notifications are not available in this environment",
                ))
            }
            NativeState::Granted => {}
            NativeState::Denied | NativeState::Default | NativeState::Unknown => {
                let state = self.inner.permission.request_native().await?;
                if state != NativeState::Granted {
                    return Err(permission_required(
                        "the user did not grant the notification permission",
                    ));
                }
            }
        }

        self.inner.permission.set_enabled(true)?;
        self.ensure_worker_ready().await?;
        self.inner.tokens.acquire().await
    }
}

impl std::fmt::Debug for Messaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messaging")
            .field("app", &self.inner.app.name())
            .finish()
    }
}

static MESSAGING_COMPONENT: LazyLock<()> = LazyLock::new(|| {
    let factory: InstanceFactory = Arc::new(messaging_factory);
    let component = Component::new(MESSAGING_COMPONENT_NAME, factory)
        .with_instantiation_mode(InstantiationMode::Lazy);
    let _ = registry::register_component(component);
});

fn messaging_factory(
    container: &ComponentContainer,
    _options: InstanceFactoryOptions,
) -> Result<DynService, ComponentError> {
    let app = container.root_service::<ClientApp>().ok_or_else(|| {
        ComponentError::InitializationFailed {
            name: MESSAGING_COMPONENT_NAME.to_string(),
            reason: "application not attached to component container".to_string(),
        }
    })?;
    let messaging = Messaging::with_deps((*app).clone(), MessagingDeps::memory()).map_err(
        |err| ComponentError::InitializationFailed {
            name: MESSAGING_COMPONENT_NAME.to_string(),
            reason: err.to_string(),
        },
    )?;
    Ok(Arc::new(messaging) as DynService)
}

pub fn register_messaging_component() {
    LazyLock::force(&MESSAGING_COMPONENT);
}

/// Resolves the messaging service for the given app (or the default app),
/// creating it on first use through the component container.
pub fn get_messaging(app: Option<ClientApp>) -> MessagingResult<Arc<Messaging>> {
    register_messaging_component();
    let app = match app {
        Some(app) => app,
        None => app::get_app(None).map_err(|err| internal_error(err.to_string()))?,
    };

    let provider = registry::get_provider(&app, MESSAGING_COMPONENT_NAME);
    if let Some(messaging) = provider.get_immediate::<Messaging>() {
        Ok(messaging)
    } else {
        provider
            .initialize::<Messaging>(serde_json::Value::Null, None)
            .map_err(|err| internal_error(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{initialize_app, AppOptions, AppSettings};
    use crate::logger::LogLevel;
    use crate::messaging::router::ToastKind;
    use crate::platform::web::NativePermission;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static TEST_COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_settings() -> AppSettings {
        AppSettings {
            name: Some(format!(
                "messaging-{}",
                TEST_COUNTER.fetch_add(1, Ordering::SeqCst)
            )),
        }
    }

    fn app_options(server: &MockServer) -> AppOptions {
        AppOptions {
            api_base_url: Some(server.base_url()),
            session_token: Some("session-abc".to_string()),
            sender_id: Some("473829110".to_string()),
            vapid_key: Some("BPx-vapid".to_string()),
            worker_scope: Some("https://app.test/".to_string()),
            offline_assets: Some(vec!["/".to_string(), "/offline.html".to_string()]),
            cache_version: Some("v2".to_string()),
            ..Default::default()
        }
    }

    fn quiet_deps() -> MessagingDeps {
        MessagingDeps {
            prompt_delay: Duration::ZERO,
            timing: TokenTiming {
                retry_delay: Duration::from_millis(1),
                ..TokenTiming::default()
            },
            ..MessagingDeps::memory()
        }
    }

    // The memory worker env needs the offline assets to be fetchable, so
    // swap in a pre-routed network.
    fn deps_with_routed_worker() -> MessagingDeps {
        use crate::platform::memory::{
            MemoryCaches, MemoryNetwork, MemoryNotifications, MemoryWindows,
        };
        use crate::platform::web::WebResponse;

        let network = MemoryNetwork::new();
        for asset in ["/", "/offline.html"] {
            let url = Url::parse("https://app.test/").unwrap().join(asset).unwrap();
            network.route(&url, WebResponse::ok("text/html", asset));
        }
        MessagingDeps {
            worker_env: WorkerEnv {
                network: Arc::new(network),
                caches: Arc::new(MemoryCaches::new()),
                notifications: Arc::new(MemoryNotifications::new()),
                windows: Arc::new(MemoryWindows::new()),
            },
            ..quiet_deps()
        }
    }

    fn quiet(messaging: &Messaging) {
        messaging.logger().set_log_level(LogLevel::Silent);
        messaging.tokens().logger().set_log_level(LogLevel::Silent);
        messaging.feed().logger().set_log_level(LogLevel::Silent);
        messaging.router().logger().set_log_level(LogLevel::Silent);
    }

    fn mock_register(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST).path("/notifications/token/register");
            then.status(200).json_body(json!({"ok": true}));
        })
    }

    #[tokio::test(flavor = "current_thread")]
    async fn enable_flow_activates_worker_and_registers_token() {
        let server = MockServer::start();
        let register = mock_register(&server);

        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps_with_routed_worker()).unwrap();
        quiet(&messaging);

        let outcome = messaging.enable_notifications().await.unwrap();
        assert_eq!(outcome.token.len(), 32);
        assert!(outcome.backend_synced);
        register.assert();

        assert!(messaging.permission().is_active());
        let registration = messaging.worker().registration().await.unwrap();
        assert!(registration.is_active());
        // The worker received the provider credentials from the page.
        assert_eq!(
            messaging.worker().provider_config().unwrap().sender_id.as_deref(),
            Some("473829110")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn enable_twice_reuses_the_cached_token() {
        let server = MockServer::start();
        let register = mock_register(&server);

        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps_with_routed_worker()).unwrap();
        quiet(&messaging);

        let first = messaging.enable_notifications().await.unwrap();
        let second = messaging.enable_notifications().await.unwrap();
        assert_eq!(first.token, second.token);
        register.assert_hits(1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn denied_user_response_fails_enable_with_a_toast() {
        let server = MockServer::start();
        let deps = deps_with_routed_worker();
        let permissions = MemoryPermission::new();
        permissions.respond_with(NativePermission::Denied);
        let deps = MessagingDeps {
            permissions: Arc::new(permissions),
            ..deps
        };

        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps).unwrap();
        quiet(&messaging);
        let toasts = messaging.subscribe_toasts();

        let err = messaging.enable_notifications().await.unwrap_err();
        assert_eq!(err.code_str(), "push/permission-required");

        let toast = toasts.try_recv().unwrap();
        assert_eq!(toast.kind, ToastKind::Failure);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn backend_registration_failure_is_surfaced_but_token_kept() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/notifications/token/register");
            then.status(503);
        });

        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps_with_routed_worker()).unwrap();
        quiet(&messaging);
        let toasts = messaging.subscribe_toasts();

        let outcome = messaging.enable_notifications().await.unwrap();
        assert!(!outcome.backend_synced);
        assert!(messaging.tokens().cached_token().is_some());

        let toast = toasts.try_recv().unwrap();
        assert_eq!(toast.kind, ToastKind::Failure);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disable_releases_the_registered_token() {
        let server = MockServer::start();
        mock_register(&server);
        let remove = server.mock(|when, then| {
            when.method(POST).path("/notifications/token/remove");
            then.status(200).json_body(json!({"ok": true}));
        });

        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps_with_routed_worker()).unwrap();
        quiet(&messaging);

        messaging.enable_notifications().await.unwrap();
        assert!(messaging.disable_notifications().await.unwrap());

        remove.assert_hits(1);
        assert!(!messaging.permission().enabled);
        assert!(!messaging.permission().is_active());
        assert!(messaging.tokens().cached_token().is_none());

        // Disabling again is a no-op.
        assert!(!messaging.disable_notifications().await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn bootstrap_is_passive_and_completes_pending_registration() {
        let server = MockServer::start();
        let register = mock_register(&server);
        let missed = server.mock(|when, then| {
            when.method(GET).path("/notifications/check-missed");
            then.status(200).json_body(json!({"missedNotifications": 2}));
        });

        let deps = deps_with_routed_worker();
        let permissions = MemoryPermission::new();
        permissions.set_current(NativePermission::Granted);
        let storage = crate::platform::memory::MemoryStorage::new();
        storage.set(crate::messaging::constants::STORAGE_KEY_ENABLED, "true");
        // A token minted on a previous load whose registration never
        // happened.
        let record = crate::messaging::token_store::TokenRecord::new(
            "tok-pending".to_string(),
            "473829110".to_string(),
            chrono::Utc::now(),
        );
        crate::messaging::token_store::write_token(&storage, &record).unwrap();

        let deps = MessagingDeps {
            permissions: Arc::new(permissions),
            storage: Arc::new(storage),
            ..deps
        };

        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps).unwrap();
        quiet(&messaging);
        let toasts = messaging.subscribe_toasts();

        let snapshot = messaging.bootstrap().await;
        assert!(snapshot.is_active());
        register.assert_hits(1);
        missed.assert_hits(1);
        assert!(messaging.tokens().cached_token().unwrap().backend_synced);
        // Passive flows never toast.
        assert!(toasts.try_recv().is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn bootstrap_without_opt_in_does_nothing() {
        let server = MockServer::start();
        let register = mock_register(&server);

        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps_with_routed_worker()).unwrap();
        quiet(&messaging);

        let snapshot = messaging.bootstrap().await;
        assert!(!snapshot.is_active());
        register.assert_hits(0);
        assert!(messaging.worker().registration().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn get_messaging_memoizes_per_app() {
        let server = MockServer::start();
        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();

        let first = get_messaging(Some(app.clone())).unwrap();
        let second = get_messaging(Some(app)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn with_deps_requires_a_backend_origin() {
        let options = AppOptions {
            sender_id: Some("473829110".to_string()),
            ..Default::default()
        };
        let app = initialize_app(options, Some(unique_settings())).unwrap();
        let err = Messaging::with_deps(app, quiet_deps()).unwrap_err();
        assert_eq!(err.code_str(), "push/invalid-argument");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn foreground_dispatch_lands_in_feed_and_toasts() {
        let server = MockServer::start();
        let app = initialize_app(app_options(&server), Some(unique_settings())).unwrap();
        let messaging = Messaging::with_deps(app, deps_with_routed_worker()).unwrap();
        quiet(&messaging);
        let toasts = messaging.subscribe_toasts();

        messaging.dispatch_foreground(MessagePayload {
            notification: Some(crate::messaging::types::NotificationPayload {
                title: Some("Blood needed".to_string()),
                body: Some("O-".to_string()),
                ..Default::default()
            }),
            message_id: Some("m-1".to_string()),
            ..Default::default()
        });

        assert_eq!(messaging.feed().unread_count(), 1);
        assert_eq!(toasts.try_recv().unwrap().kind, ToastKind::Incoming);
    }
}
