use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::component::provider::Provider;
use crate::component::types::{ComponentError, DynService};
use crate::component::Component;

/// Per-application set of providers plus the root service (the application
/// handle itself), which factories resolve their dependencies from.
#[derive(Clone)]
pub struct ComponentContainer {
    pub(crate) inner: Arc<ComponentContainerInner>,
}

pub(crate) struct ComponentContainerInner {
    pub name: Arc<str>,
    pub providers: Mutex<HashMap<Arc<str>, Provider>>,
    pub root_service: Mutex<Option<DynService>>,
}

impl ComponentContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ComponentContainerInner {
                name: Arc::from(name.into()),
                providers: Mutex::new(HashMap::new()),
                root_service: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn add_component(&self, component: Component) -> Result<(), ComponentError> {
        self.get_provider(component.name()).set_component(component)
    }

    /// Fetches (creating on first use) the provider for a component name.
    pub fn get_provider(&self, name: &str) -> Provider {
        if let Some(provider) = self.inner.providers.lock().unwrap().get(name) {
            return provider.clone();
        }

        let provider = Provider::new(name, self.clone());
        self.inner
            .providers
            .lock()
            .unwrap()
            .insert(Arc::from(name.to_owned()), provider.clone());
        provider
    }

    pub fn get_providers(&self) -> Vec<Provider> {
        self.inner
            .providers
            .lock()
            .unwrap()
            .values()
            .cloned()
            .collect()
    }

    pub fn attach_root_service(&self, service: DynService) {
        *self.inner.root_service.lock().unwrap() = Some(service);
    }

    pub fn root_service<T: 'static + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .root_service
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|service| Arc::clone(service).downcast::<T>().ok())
    }
}
