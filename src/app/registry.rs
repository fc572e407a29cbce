use std::collections::HashMap;
use std::sync::{LazyLock, MutexGuard};

use crate::component::{self, Component, Provider};

use crate::app::types::{AppRegistry, ClientApp};

pub static APPS: LazyLock<AppRegistry> = LazyLock::new(|| Default::default());

pub(crate) fn apps_guard() -> MutexGuard<'static, HashMap<String, ClientApp>> {
    APPS.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Registers a global component and propagates it to already-initialized
/// apps, so registration order does not matter.
pub fn register_component(component: Component) -> bool {
    if !component::register_component(component.clone()) {
        return false;
    }

    for app in apps_guard().values() {
        let _ = app.container().add_component(component.clone());
    }

    true
}

/// Fetches the provider for the named component on the given app.
pub fn get_provider(app: &ClientApp, name: &str) -> Provider {
    app.container().get_provider(name)
}

/// Removes a cached service instance so the next lookup rebuilds it.
#[allow(dead_code)]
pub fn remove_service_instance(app: &ClientApp, name: &str, identifier: Option<&str>) {
    let identifier = identifier.unwrap_or(component::DEFAULT_ENTRY_NAME);
    get_provider(app, name).clear_instance(identifier);
}
