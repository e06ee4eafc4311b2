// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Local execution layer: registry connections turned into bindings.

use parking_lot::Mutex;
use std::sync::Arc;
use taskmesh::{
    Command, CommandError, CommandQueueing, Component, ConnectionState, InterfaceOptions,
    InterfaceRole, LocalManager, ManagerConfig, Registry, RegistryError,
};

struct Fixture {
    manager: Arc<LocalManager>,
    server: Arc<Component>,
    client: Arc<Component>,
    gains: Arc<Mutex<Vec<f64>>>,
}

fn fixture() -> Fixture {
    let registry = Registry::new(ManagerConfig {
        disconnect_grace_ms: 0,
        ..ManagerConfig::default()
    })
    .unwrap();
    let manager = LocalManager::new("P1", registry).unwrap();

    let gains = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&gains);
    let server = Component::new("Robot");
    let main = server
        .add_interface_provided("Main", InterfaceOptions::default())
        .unwrap();
    main.add_command(
        Command::write("SetGain", move |gain: &f64| sink.lock().push(*gain)),
        CommandQueueing::Inherit,
    )
    .unwrap();
    let server = manager.add_component(server).unwrap();

    let client = Component::new("Controller");
    client.add_interface_required("Robot").unwrap();
    let client = manager.add_component(client).unwrap();

    Fixture {
        manager,
        server,
        client,
        gains,
    }
}

#[test]
fn test_components_mirrored_in_registry() {
    let f = fixture();
    let registry = f.manager.registry();
    assert!(registry.find_interface_provided("P1", "Robot", "Main"));
    assert!(registry.find_interface_required("P1", "Controller", "Robot"));
    assert_eq!(registry.component_names("P1"), vec!["Controller", "Robot"]);

    assert!(matches!(
        f.manager.add_component(Component::new("Robot")),
        Err(RegistryError::AlreadyExists { .. })
    ));
    assert!(matches!(
        LocalManager::new("P1", registry.clone()),
        Err(RegistryError::AlreadyExists { .. })
    ));
}

#[test]
fn test_connect_binds_and_disconnect_releases() {
    let f = fixture();
    let id = f.manager.connect("Controller", "Robot", "Robot", "Main").unwrap();
    let registry = f.manager.registry();
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Connected));

    let binding = f.client.required_binding("Robot").unwrap();
    let main = f.server.interface_provided("Main").unwrap();
    assert!(binding.is_owned_by(&main));
    assert_eq!(main.user_names(), vec!["Controller"]);

    binding.call_write("SetGain", &0.25_f64).unwrap();
    assert_eq!(f.manager.process_mailboxes(), 1);
    assert_eq!(*f.gains.lock(), vec![0.25]);

    f.manager.disconnect(id).unwrap();
    registry.flush_disconnects();

    assert!(f.client.required_binding("Robot").is_none());
    assert_eq!(main.binding_count(), 0);
    assert!(matches!(
        binding.call_write("SetGain", &1.0_f64),
        Err(CommandError::Disabled { .. })
    ));
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
}

#[test]
fn test_swapped_connect_arguments() {
    let f = fixture();
    let id = f.manager.connect("Robot", "Main", "Controller", "Robot").unwrap();

    let record = f.manager.registry().connection(id).unwrap();
    assert_eq!(record.description.client.component, "Controller");
    assert!(f.client.required_binding("Robot").is_some());
}

#[test]
fn test_connect_missing_interface_creates_nothing() {
    let f = fixture();
    let err = f
        .manager
        .connect("Controller", "Robot", "Robot", "Missing")
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));
    assert!(f.client.required_binding("Robot").is_none());
    assert_eq!(f.server.interface_provided("Main").unwrap().binding_count(), 0);
}

#[test]
fn test_second_connect_rejected() {
    let f = fixture();
    f.manager.connect("Controller", "Robot", "Robot", "Main").unwrap();
    assert!(matches!(
        f.manager.connect("Controller", "Robot", "Robot", "Main"),
        Err(RegistryError::AlreadyConnected { .. })
    ));
    assert_eq!(f.server.interface_provided("Main").unwrap().binding_count(), 1);
}

#[test]
fn test_remove_server_component_unbinds_client() {
    let f = fixture();
    let id = f.manager.connect("Controller", "Robot", "Robot", "Main").unwrap();

    f.manager.remove_component("Robot").unwrap();
    assert!(f.client.required_binding("Robot").is_none());
    assert!(f.manager.component("Robot").is_none());

    let registry = f.manager.registry();
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    assert_eq!(
        registry.connection_ids(
            &taskmesh::InterfaceRef::new("P1", "Controller", "Robot"),
            InterfaceRole::Required
        ),
        Some(vec![])
    );
}

#[test]
fn test_teardown_without_execution_layer() {
    let f = fixture();
    let id = f.manager.connect("Controller", "Robot", "Robot", "Main").unwrap();
    let registry = f.manager.registry().clone();
    let client = Arc::clone(&f.client);
    drop(f);

    registry.disconnect(id).unwrap();
    registry.flush_disconnects();
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    // The binding was never released locally.
    assert!(client.required_binding("Robot").is_some());
}

#[test]
fn test_remove_process_releases_local_bindings() {
    let f = fixture();
    let id = f.manager.connect("Controller", "Robot", "Robot", "Main").unwrap();
    let registry = f.manager.registry();
    let binding = f.client.required_binding("Robot").unwrap();

    registry.remove_process("P1").unwrap();
    registry.flush_disconnects();

    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    assert_eq!(f.server.interface_provided("Main").unwrap().binding_count(), 0);
    assert!(f.client.required_binding("Robot").is_none());
    assert!(matches!(
        binding.call_write("SetGain", &1.0_f64),
        Err(CommandError::Disabled { .. })
    ));
}
