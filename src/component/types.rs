use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::component::container::ComponentContainer;

pub type DynService = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstantiationMode {
    /// Instantiated on first request.
    Lazy,
    /// Instantiated as soon as the component attaches to a container.
    Eager,
    /// Only instantiated through an explicit `initialize` call.
    Explicit,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceFactoryOptions {
    pub instance_identifier: Option<String>,
    pub options: Value,
}

impl InstanceFactoryOptions {
    pub fn new(instance_identifier: Option<String>, options: Value) -> Self {
        Self {
            instance_identifier,
            options,
        }
    }
}

pub type InstanceFactory = Arc<
    dyn Fn(&ComponentContainer, InstanceFactoryOptions) -> Result<DynService, ComponentError>
        + Send
        + Sync,
>;

#[derive(Debug)]
pub enum ComponentError {
    MismatchingComponent { expected: String, found: String },
    ComponentAlreadyProvided { name: String },
    InstanceAlreadyInitialized { name: String, identifier: String },
    InitializationFailed { name: String, reason: String },
    InstanceUnavailable { name: String },
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::MismatchingComponent { expected, found } => {
                write!(f, "component {found} cannot satisfy provider for {expected}")
            }
            ComponentError::ComponentAlreadyProvided { name } => {
                write!(f, "component {name} has already been registered")
            }
            ComponentError::InstanceAlreadyInitialized { name, identifier } => {
                write!(f, "{name}({identifier}) has already been initialized")
            }
            ComponentError::InitializationFailed { name, reason } => {
                write!(f, "component {name} failed to initialize: {reason}")
            }
            ComponentError::InstanceUnavailable { name } => {
                write!(f, "service {name} is not available")
            }
        }
    }
}

impl std::error::Error for ComponentError {}
