//! Service registry and dependency-injection container.
//!
//! SDK services (messaging, future additions) are described by a
//! [`Component`] — a named factory. Each application instance owns a
//! [`ComponentContainer`]; a [`Provider`] memoizes the service instance per
//! container, so every caller receives the same handle (get-or-create rather
//! than module-scope mutable state) and tests can drop an instance with
//! [`Provider::clear_instance`].

mod component;
pub mod constants;
pub mod container;
pub mod provider;
pub mod types;

pub use component::Component;
pub use constants::DEFAULT_ENTRY_NAME;
pub use container::ComponentContainer;
pub use provider::Provider;
pub use types::{ComponentError, InstanceFactory, InstantiationMode};

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

#[cfg(test)]
mod tests;

static GLOBAL_COMPONENTS: LazyLock<Mutex<HashMap<Arc<str>, Component>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub fn global_components() -> &'static Mutex<HashMap<Arc<str>, Component>> {
    &GLOBAL_COMPONENTS
}

/// Registers a component for all future containers. Returns false when a
/// component with the same name is already registered.
pub fn register_component(component: Component) -> bool {
    let mut guard = GLOBAL_COMPONENTS.lock().unwrap();
    if guard.contains_key(component.name()) {
        return false;
    }
    guard.insert(Arc::from(component.name().to_owned()), component);
    true
}
