use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::app::errors::{AppError, AppResult};
use crate::component::types::DynService;
use crate::component::{Component, ComponentContainer};

/// Static configuration for one application instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppOptions {
    /// Origin of the HemoLink REST backend, e.g. `https://api.hemolink.org`.
    pub api_base_url: Option<String>,
    /// Opaque bearer credential sent on every backend call.
    pub session_token: Option<String>,
    /// Push-provider sender id this client mints tokens against.
    pub sender_id: Option<String>,
    /// Public web-push key handed to the provider during token minting.
    pub vapid_key: Option<String>,
    pub app_id: Option<String>,
    /// Absolute URL the service worker is scoped to.
    pub worker_scope: Option<String>,
    /// Same-origin paths pre-cached for offline use. Must include the
    /// offline fallback page.
    pub offline_assets: Option<Vec<String>>,
    /// Cache version tag; bumping it purges caches of older deployments.
    pub cache_version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppSettings {
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub name: Arc<str>,
}

impl AppConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into().into_boxed_str()),
        }
    }
}

/// Handle to one initialized application instance.
#[derive(Clone)]
pub struct ClientApp {
    inner: Arc<ClientAppInner>,
}

struct ClientAppInner {
    options: AppOptions,
    config: AppConfig,
    is_deleted: AtomicBool,
    container: ComponentContainer,
}

impl ClientApp {
    pub fn new(options: AppOptions, config: AppConfig, container: ComponentContainer) -> Self {
        let app = Self {
            inner: Arc::new(ClientAppInner {
                options,
                config,
                is_deleted: AtomicBool::new(false),
                container,
            }),
        };
        let root: DynService = Arc::new(app.clone());
        app.inner.container.attach_root_service(root);
        app
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn options(&self) -> AppOptions {
        self.inner.options.clone()
    }

    pub fn config(&self) -> AppConfig {
        self.inner.config.clone()
    }

    pub fn container(&self) -> ComponentContainer {
        self.inner.container.clone()
    }

    pub fn add_component(&self, component: Component) -> AppResult<()> {
        self.check_destroyed()?;
        self.inner
            .container
            .add_component(component)
            .map_err(AppError::from)
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.is_deleted.load(Ordering::SeqCst)
    }

    pub(crate) fn set_is_deleted(&self, value: bool) {
        self.inner.is_deleted.store(value, Ordering::SeqCst);
    }

    pub fn check_destroyed(&self) -> AppResult<()> {
        if self.is_deleted() {
            return Err(AppError::AppDeleted {
                app_name: self.name().to_owned(),
            });
        }
        Ok(())
    }

    /// True when the same container backs both handles.
    pub fn same_instance(&self, other: &ClientApp) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ClientApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientApp")
            .field("name", &self.name())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

// Registry values need interior mutability behind a shared map.
pub(crate) type AppRegistry = Mutex<std::collections::HashMap<String, ClientApp>>;
