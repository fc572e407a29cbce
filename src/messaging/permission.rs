//! Permission and subscription state machine.
//!
//! Two independent inputs are reconciled here: the browser's native
//! notification permission (only the user can change it, through browser UI)
//! and the in-app preference flag. All UI surfaces query this machine
//! instead of re-deriving state from raw storage flags.
//!
//! Prompt policy: the opt-in dialog is shown at most once per device
//! (tracked by a durable "asked" flag), after a short delay so the page is
//! interactive first. A denied native permission is terminal — no code path
//! prompts again until the user resets it in browser settings.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::messaging::constants::{
    PROMPT_MOUNT_DELAY_MS, STORAGE_KEY_ASKED, STORAGE_KEY_ENABLED,
};
use crate::messaging::error::{permission_blocked, unsupported_environment, MessagingResult};
use crate::messaging::support::is_supported;
use crate::platform::runtime;
use crate::platform::web::{KeyValueStorage, NativePermission, PermissionSurface};

/// Native permission extended with the pre-query and no-API states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeState {
    Unknown,
    Unsupported,
    Default,
    Granted,
    Denied,
}

impl From<NativePermission> for NativeState {
    fn from(permission: NativePermission) -> Self {
        match permission {
            NativePermission::Default => NativeState::Default,
            NativePermission::Granted => NativeState::Granted,
            NativePermission::Denied => NativeState::Denied,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionSnapshot {
    pub native: NativeState,
    /// In-app preference; only meaningful while `native` is granted.
    pub enabled: bool,
    /// Whether this device has ever shown the opt-in dialog.
    pub asked: bool,
}

impl PermissionSnapshot {
    /// Notifications are actually flowing only when the user granted the
    /// native permission *and* opted in.
    pub fn is_active(&self) -> bool {
        self.native == NativeState::Granted && self.enabled
    }

    /// Native permission granted but the app preference is off — the state
    /// that triggers the re-enable UI.
    pub fn needs_reprompt(&self) -> bool {
        self.native == NativeState::Granted && !self.enabled
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptOutcome {
    Granted,
    Denied,
    /// The user closed the prompt without deciding; permission stays
    /// undecided but the dialog will not be shown again on this device.
    Dismissed,
    Suppressed(SuppressedReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressedReason {
    Unsupported,
    AlreadyGranted,
    AlreadyAsked,
    PermanentlyDenied,
}

#[derive(Clone)]
pub struct PermissionMachine {
    inner: Arc<PermissionMachineInner>,
}

struct PermissionMachineInner {
    surface: Arc<dyn PermissionSurface>,
    storage: Arc<dyn KeyValueStorage>,
    state: Mutex<PermissionSnapshot>,
    prompt_delay: Duration,
}

impl PermissionMachine {
    /// Queries the platform once and loads the durable flags.
    pub fn bootstrap(
        surface: Arc<dyn PermissionSurface>,
        storage: Arc<dyn KeyValueStorage>,
        prompt_delay: Duration,
    ) -> Self {
        let native = if is_supported(surface.as_ref()) {
            NativeState::from(surface.current_permission())
        } else {
            NativeState::Unsupported
        };
        let snapshot = PermissionSnapshot {
            native,
            enabled: read_flag(storage.as_ref(), STORAGE_KEY_ENABLED),
            asked: read_flag(storage.as_ref(), STORAGE_KEY_ASKED),
        };
        Self {
            inner: Arc::new(PermissionMachineInner {
                surface,
                storage,
                state: Mutex::new(snapshot),
                prompt_delay,
            }),
        }
    }

    pub fn default_prompt_delay() -> Duration {
        Duration::from_millis(PROMPT_MOUNT_DELAY_MS)
    }

    pub fn snapshot(&self) -> PermissionSnapshot {
        *self.inner.state.lock().unwrap()
    }

    /// Re-queries the platform; another tab may have changed the permission.
    pub fn refresh_native(&self) -> NativeState {
        let mut state = self.inner.state.lock().unwrap();
        if state.native != NativeState::Unsupported {
            state.native = NativeState::from(self.inner.surface.current_permission());
        }
        // The enabled/asked flags are shared durable state too.
        state.enabled = read_flag(self.inner.storage.as_ref(), STORAGE_KEY_ENABLED);
        state.asked = read_flag(self.inner.storage.as_ref(), STORAGE_KEY_ASKED);
        state.native
    }

    /// Mount-time prompt flow: waits out the mount delay, then shows the
    /// native prompt unless policy suppresses it.
    pub async fn maybe_prompt(&self) -> PromptOutcome {
        match self.snapshot().native {
            NativeState::Unsupported => {
                return PromptOutcome::Suppressed(SuppressedReason::Unsupported)
            }
            NativeState::Denied => {
                return PromptOutcome::Suppressed(SuppressedReason::PermanentlyDenied)
            }
            NativeState::Granted => {
                return PromptOutcome::Suppressed(SuppressedReason::AlreadyGranted)
            }
            NativeState::Unknown | NativeState::Default => {}
        }

        if self.snapshot().asked {
            return PromptOutcome::Suppressed(SuppressedReason::AlreadyAsked);
        }

        runtime::sleep(self.inner.prompt_delay).await;

        // Re-check: a concurrent tab may have prompted during the delay.
        self.refresh_native();
        let current = self.snapshot();
        if current.asked {
            return PromptOutcome::Suppressed(SuppressedReason::AlreadyAsked);
        }
        match current.native {
            NativeState::Denied => {
                return PromptOutcome::Suppressed(SuppressedReason::PermanentlyDenied)
            }
            NativeState::Granted => {
                return PromptOutcome::Suppressed(SuppressedReason::AlreadyGranted)
            }
            _ => {}
        }

        self.mark_asked();
        match self.run_prompt().await {
            NativeState::Granted => PromptOutcome::Granted,
            NativeState::Denied => PromptOutcome::Denied,
            _ => PromptOutcome::Dismissed,
        }
    }

    /// Explicit, user-gesture-driven prompt (e.g. the in-app enable button).
    /// Not subject to the asked-once policy, but a denied permission stays
    /// terminal.
    pub async fn request_native(&self) -> MessagingResult<NativeState> {
        match self.snapshot().native {
            NativeState::Unsupported => Err(unsupported_environment(
                "this environment does not expose the notification APIs",
            )),
            NativeState::Denied => Err(permission_blocked(
                "notification permission was previously denied by the user",
            )),
            NativeState::Granted => Ok(NativeState::Granted),
            NativeState::Unknown | NativeState::Default => {
                self.mark_asked();
                Ok(self.run_prompt().await)
            }
        }
    }

    /// Flips the in-app preference. Enabling requires a granted native
    /// permission; disabling is always allowed.
    pub fn set_enabled(&self, enabled: bool) -> MessagingResult<PermissionSnapshot> {
        let mut state = self.inner.state.lock().unwrap();
        if enabled && state.native != NativeState::Granted {
            return Err(permission_blocked(
                "cannot enable notifications without a granted permission",
            ));
        }
        state.enabled = enabled;
        write_flag(self.inner.storage.as_ref(), STORAGE_KEY_ENABLED, enabled);
        Ok(*state)
    }

    async fn run_prompt(&self) -> NativeState {
        let response = self.inner.surface.request_permission().await;
        let native = NativeState::from(response);
        self.inner.state.lock().unwrap().native = native;
        native
    }

    fn mark_asked(&self) {
        self.inner.state.lock().unwrap().asked = true;
        write_flag(self.inner.storage.as_ref(), STORAGE_KEY_ASKED, true);
    }
}

fn read_flag(storage: &dyn KeyValueStorage, key: &str) -> bool {
    storage.get(key).as_deref() == Some("true")
}

fn write_flag(storage: &dyn KeyValueStorage, key: &str, value: bool) {
    storage.set(key, if value { "true" } else { "false" });
}
