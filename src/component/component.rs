use std::sync::Arc;

use crate::component::types::{InstanceFactory, InstantiationMode};

/// A named service factory attachable to any [`ComponentContainer`].
///
/// [`ComponentContainer`]: crate::component::ComponentContainer
#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    pub(crate) instance_factory: InstanceFactory,
    pub(crate) instantiation_mode: InstantiationMode,
    pub(crate) multiple_instances: bool,
}

impl Component {
    pub fn new(name: impl Into<String>, instance_factory: InstanceFactory) -> Self {
        Self {
            name: Arc::from(name.into()),
            instance_factory,
            instantiation_mode: InstantiationMode::Lazy,
            multiple_instances: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instantiation_mode(&self) -> InstantiationMode {
        self.instantiation_mode
    }

    pub fn multiple_instances(&self) -> bool {
        self.multiple_instances
    }

    pub fn with_instantiation_mode(mut self, mode: InstantiationMode) -> Self {
        self.instantiation_mode = mode;
        self
    }

    pub fn with_multiple_instances(mut self, multiple: bool) -> Self {
        self.multiple_instances = multiple;
        self
    }
}
