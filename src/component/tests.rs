use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::component::types::{ComponentError, DynService, InstanceFactory};
use crate::component::{Component, ComponentContainer, InstantiationMode, DEFAULT_ENTRY_NAME};

fn counting_factory(counter: Arc<AtomicUsize>) -> InstanceFactory {
    Arc::new(move |_container, _options| {
        let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(value) as DynService)
    })
}

#[test]
fn get_immediate_memoizes_instances() {
    let container = ComponentContainer::new("test-app");
    let counter = Arc::new(AtomicUsize::new(0));
    container
        .add_component(Component::new("svc", counting_factory(counter.clone())))
        .unwrap();

    let provider = container.get_provider("svc");
    let first = provider.get_immediate::<usize>().expect("first");
    let second = provider.get_immediate::<usize>().expect("second");

    assert_eq!(*first, 1);
    assert_eq!(*second, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn clear_instance_forces_reinstantiation() {
    let container = ComponentContainer::new("test-app");
    let counter = Arc::new(AtomicUsize::new(0));
    container
        .add_component(Component::new("svc", counting_factory(counter)))
        .unwrap();

    let provider = container.get_provider("svc");
    assert_eq!(*provider.get_immediate::<usize>().unwrap(), 1);

    provider.clear_instance(DEFAULT_ENTRY_NAME);
    assert_eq!(*provider.get_immediate::<usize>().unwrap(), 2);
}

#[test]
fn explicit_components_require_initialize() {
    let container = ComponentContainer::new("test-app");
    let counter = Arc::new(AtomicUsize::new(0));
    let component = Component::new("svc", counting_factory(counter))
        .with_instantiation_mode(InstantiationMode::Explicit);
    container.add_component(component).unwrap();

    let provider = container.get_provider("svc");
    assert!(provider.get_immediate::<usize>().is_none());

    let value = provider.initialize::<usize>(Value::Null, None).unwrap();
    assert_eq!(*value, 1);

    let err = provider.initialize::<usize>(Value::Null, None).unwrap_err();
    assert!(matches!(
        err,
        ComponentError::InstanceAlreadyInitialized { .. }
    ));
}

#[test]
fn eager_components_instantiate_on_attach() {
    let container = ComponentContainer::new("test-app");
    let counter = Arc::new(AtomicUsize::new(0));
    let component = Component::new("svc", counting_factory(counter.clone()))
        .with_instantiation_mode(InstantiationMode::Eager);
    container.add_component(component).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_component_is_rejected() {
    let container = ComponentContainer::new("test-app");
    let counter = Arc::new(AtomicUsize::new(0));
    container
        .add_component(Component::new("svc", counting_factory(counter.clone())))
        .unwrap();

    let err = container
        .add_component(Component::new("svc", counting_factory(counter)))
        .unwrap_err();
    assert!(matches!(err, ComponentError::ComponentAlreadyProvided { .. }));
}

#[test]
fn multiple_instance_components_keep_identifiers_apart() {
    let container = ComponentContainer::new("test-app");
    let counter = Arc::new(AtomicUsize::new(0));
    let component = Component::new("svc", counting_factory(counter))
        .with_instantiation_mode(InstantiationMode::Explicit)
        .with_multiple_instances(true);
    container.add_component(component).unwrap();

    let provider = container.get_provider("svc");
    let a = provider.initialize::<usize>(Value::Null, Some("a")).unwrap();
    let b = provider.initialize::<usize>(Value::Null, Some("b")).unwrap();
    assert_ne!(*a, *b);
    assert!(provider.is_initialized(Some("a")));
    assert!(!provider.is_initialized(Some("c")));
}

#[test]
fn root_service_downcasts_to_concrete_type() {
    let container = ComponentContainer::new("test-app");
    container.attach_root_service(Arc::new("root".to_string()) as DynService);

    assert_eq!(
        container.root_service::<String>().as_deref(),
        Some(&"root".to_string())
    );
    assert!(container.root_service::<usize>().is_none());
}
