// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::too_many_lines)] // Scenario tests

//! Global registry lifecycle tests
//!
//! Connection bookkeeping across processes, asynchronous disconnects,
//! cascading removal and network proxy failures.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use taskmesh::naming;
use taskmesh::{
    ConnectionDescription, ConnectionId, ConnectionState, InterfaceDescription, InterfaceRef,
    InterfaceRole, ManagerConfig, NameQuery, NetworkProxy, ProxyError, Registry, RegistryError,
    RegistryEvent,
};

fn test_config() -> ManagerConfig {
    ManagerConfig {
        disconnect_grace_ms: 0,
        ..ManagerConfig::default()
    }
}

/// P1:C1 provides Main, P2:C2 requires Req.
fn two_processes(registry: &Registry) -> (InterfaceRef, InterfaceRef) {
    registry.add_process("P1").unwrap();
    registry.add_component("P1", "C1").unwrap();
    registry.add_interface_provided("P1", "C1", "Main").unwrap();
    registry.add_process("P2").unwrap();
    registry.add_component("P2", "C2").unwrap();
    registry.add_interface_required("P2", "C2", "Req").unwrap();
    (
        InterfaceRef::new("P2", "C2", "Req"),
        InterfaceRef::new("P1", "C1", "Main"),
    )
}

fn drain(events: &crossbeam::channel::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
    events.try_iter().collect()
}

#[test]
fn test_connect_confirm_disconnect_scenario() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);

    let id = registry.connect("P2", &client, &server).unwrap();
    assert!(id.is_valid());
    assert_eq!(registry.connection_ids(&client, InterfaceRole::Required), Some(vec![id]));
    assert_eq!(registry.connection_ids(&server, InterfaceRole::Provided), Some(vec![id]));

    registry.connect_confirm(id).unwrap();
    let listed = registry.list_connections();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].client, client);
    assert_eq!(listed[0].server, server);
    assert_eq!(registry.connection_id(&client, &server), Some(id));

    registry.disconnect(id).unwrap();
    registry.flush_disconnects();

    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    assert!(registry.connection(id).is_none());
    assert!(registry.list_connections().is_empty());
    assert_eq!(registry.connection_ids(&client, InterfaceRole::Required), Some(vec![]));
    assert_eq!(registry.connection_ids(&server, InterfaceRole::Provided), Some(vec![]));

    // Interfaces are still there and can be reconnected with a fresh id.
    let again = registry.connect("P2", &client, &server).unwrap();
    assert!(again > id);
}

#[test]
fn test_concurrent_disconnect_is_idempotent() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);
    let id = registry.connect("P2", &client, &server).unwrap();
    registry.connect_confirm(id).unwrap();
    let events = registry.subscribe();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || registry.disconnect(id))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(()));
    }
    registry.flush_disconnects();
    // Late requests are accepted and ignored.
    assert_eq!(registry.disconnect(id), Ok(()));
    registry.flush_disconnects();

    let disconnected = drain(&events)
        .into_iter()
        .filter(|e| matches!(e, RegistryEvent::Disconnected(d) if d.id == id))
        .count();
    assert_eq!(disconnected, 1);
}

#[test]
fn test_disconnect_by_name_and_description() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);

    let id = registry.connect("P2", &client, &server).unwrap();
    registry.disconnect_by_name(&client, &server).unwrap();
    registry.flush_disconnects();
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    assert!(matches!(
        registry.disconnect_by_name(&client, &server),
        Err(RegistryError::NotFound { .. })
    ));

    let id = registry.connect("P2", &client, &server).unwrap();
    registry
        .disconnect_description(&ConnectionDescription::by_name(client.clone(), server.clone()))
        .unwrap();
    registry.flush_disconnects();
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
}

#[test]
fn test_remove_process_cascades() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);
    let id = registry.connect("P2", &client, &server).unwrap();
    registry.connect_confirm(id).unwrap();
    let events = registry.subscribe();

    registry.remove_process("P1").unwrap();
    assert!(!registry.find_process("P1"));
    assert!(!registry.find_interface_provided("P1", "C1", "Main"));
    assert!(matches!(
        registry.connection_state(id),
        Some(ConnectionState::DisconnectWaiting | ConnectionState::Disconnected)
    ));

    registry.flush_disconnects();
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    assert_eq!(registry.connection_ids(&client, InterfaceRole::Required), Some(vec![]));
    assert_eq!(registry.process_names(), vec!["P2"]);

    let events = drain(&events);
    assert!(events.contains(&RegistryEvent::InterfaceRemoved {
        interface: server.clone(),
        role: InterfaceRole::Provided,
    }));
    assert!(events.contains(&RegistryEvent::ProcessRemoved("P1".into())));
    assert!(events.iter().any(|e| matches!(e, RegistryEvent::Disconnected(d) if d.id == id)));
}

#[test]
fn test_remove_required_interface_disconnects() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);
    let id = registry.connect("P2", &client, &server).unwrap();

    registry.remove_interface_required("P2", "C2", "Req").unwrap();
    registry.flush_disconnects();
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    assert_eq!(registry.connection_ids(&server, InterfaceRole::Provided), Some(vec![]));
    assert_eq!(registry.interface_names("P2", "C2", InterfaceRole::Required), Vec::<String>::new());
}

#[test]
fn test_manager_client_dedicated_interface_removed() {
    let registry = Registry::new(test_config()).unwrap();
    let dedicated = naming::interface_component_required_for("Robot");
    registry.add_process("P").unwrap();
    registry.add_component("P", "Robot").unwrap();
    registry
        .add_interface_provided("P", "Robot", naming::INTERFACE_INTERNAL_PROVIDED)
        .unwrap();
    registry.add_component("P", "MCC").unwrap();
    registry.add_interface_required("P", "MCC", &dedicated).unwrap();

    let id = registry
        .connect(
            "P",
            &InterfaceRef::new("P", "MCC", &dedicated),
            &InterfaceRef::new("P", "Robot", naming::INTERFACE_INTERNAL_PROVIDED),
        )
        .unwrap();
    registry.disconnect(id).unwrap();
    registry.flush_disconnects();

    assert!(!registry.find_interface_required("P", "MCC", &dedicated));
    assert!(registry.find_component("P", "MCC"));
}

#[test]
fn test_empty_component_proxy_removed() {
    let registry = Registry::new(test_config()).unwrap();
    let proxy = naming::component_proxy_name("P1", "Robot");
    registry.add_process("P2").unwrap();
    registry.add_component("P2", &proxy).unwrap();
    registry
        .add_interface_provided("P2", &proxy, naming::INTERFACE_INTERNAL_PROVIDED)
        .unwrap();
    registry.add_component("P2", "Viewer").unwrap();
    registry.add_interface_required("P2", "Viewer", "Robot").unwrap();

    let id = registry
        .connect(
            "P2",
            &InterfaceRef::new("P2", "Viewer", "Robot"),
            &InterfaceRef::new("P2", &proxy, naming::INTERFACE_INTERNAL_PROVIDED),
        )
        .unwrap();
    registry.disconnect(id).unwrap();
    registry.flush_disconnects();

    assert!(!registry.find_component("P2", &proxy));
    assert!(registry.find_component("P2", "Viewer"));
}

// ============================================================================
// Network proxies
// ============================================================================

struct MockProxy {
    process: String,
    calls: Arc<Mutex<Vec<String>>>,
    fail_on: Option<&'static str>,
}

impl MockProxy {
    fn new(
        process: &str,
        calls: &Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    ) -> Arc<Self> {
        Arc::new(Self {
            process: process.to_string(),
            calls: Arc::clone(calls),
            fail_on,
        })
    }

    fn record(&self, call: &'static str) -> Result<(), ProxyError> {
        self.calls.lock().push(format!("{}:{}", self.process, call));
        if self.fail_on == Some(call) {
            return Err(ProxyError::new(call, "connection reset"));
        }
        Ok(())
    }
}

impl NetworkProxy for MockProxy {
    fn process_name(&self) -> &str {
        &self.process
    }

    fn create_component_proxy(&self, _component_proxy: &str) -> Result<(), ProxyError> {
        self.record("create_component_proxy")
    }

    fn create_provided_interface_proxy(
        &self,
        _component_proxy: &str,
        _description: &InterfaceDescription,
    ) -> Result<(), ProxyError> {
        self.record("create_provided_interface_proxy")
    }

    fn create_required_interface_proxy(
        &self,
        _component_proxy: &str,
        _interface: &str,
    ) -> Result<(), ProxyError> {
        self.record("create_required_interface_proxy")
    }

    fn connect_server_side_interface(
        &self,
        _connection: &ConnectionDescription,
    ) -> Result<(), ProxyError> {
        self.record("connect_server_side_interface")
    }

    fn connect_client_side_interface(
        &self,
        _connection: &ConnectionDescription,
    ) -> Result<(), ProxyError> {
        self.record("connect_client_side_interface")
    }

    fn provided_interface_description(
        &self,
        component: &str,
        interface: &str,
    ) -> Result<InterfaceDescription, ProxyError> {
        self.record("provided_interface_description")?;
        Ok(InterfaceDescription {
            component: component.to_string(),
            interface: interface.to_string(),
            ..InterfaceDescription::default()
        })
    }

    fn disconnect(&self, _connection: &ConnectionDescription) -> Result<(), ProxyError> {
        self.record("disconnect")
    }

    fn interface_names(
        &self,
        _component: &str,
        _interface: &str,
        query: NameQuery,
    ) -> Result<Vec<String>, ProxyError> {
        self.record("interface_names")?;
        Ok(match query {
            NameQuery::Commands => vec!["SetGain".to_string()],
            _ => Vec::new(),
        })
    }
}

#[test]
fn test_cross_process_connect_builds_proxies() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);
    let calls = Arc::new(Mutex::new(Vec::new()));
    registry.register_proxy(MockProxy::new("P1", &calls, None));
    registry.register_proxy(MockProxy::new("P2", &calls, None));

    let id = registry.connect("P2", &client, &server).unwrap();
    assert_eq!(
        *calls.lock(),
        vec![
            "P1:provided_interface_description",
            "P2:create_component_proxy",
            "P2:create_provided_interface_proxy",
            "P1:create_component_proxy",
            "P1:create_required_interface_proxy",
            "P1:connect_server_side_interface",
            "P2:connect_client_side_interface",
        ]
    );

    calls.lock().clear();
    registry.disconnect(id).unwrap();
    registry.flush_disconnects();
    assert_eq!(*calls.lock(), vec!["P1:disconnect"]);

    assert_eq!(
        registry
            .remote_interface_names("P1", "C1", "Main", NameQuery::Commands)
            .unwrap(),
        vec!["SetGain"]
    );
}

#[test]
fn test_proxy_failure_removes_remote_process() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);
    let calls = Arc::new(Mutex::new(Vec::new()));
    registry.register_proxy(MockProxy::new("P1", &calls, Some("provided_interface_description")));
    registry.register_proxy(MockProxy::new("P2", &calls, None));
    let events = registry.subscribe();

    let err = registry.connect("P2", &client, &server).unwrap_err();
    assert!(matches!(err, RegistryError::Network { ref process, .. } if process == "P1"));
    assert!(!registry.find_process("P1"));
    assert!(registry.find_process("P2"));

    registry.flush_disconnects();
    assert!(registry.list_connections().is_empty());
    assert_eq!(registry.connection_ids(&client, InterfaceRole::Required), Some(vec![]));
    assert!(drain(&events).contains(&RegistryEvent::ProcessRemoved("P1".into())));

    // The proxy went with the process.
    assert!(matches!(
        registry.remote_interface_description("P1", "C1", "Main"),
        Err(RegistryError::NotFound { .. })
    ));
}

#[test]
fn test_removed_server_process_tears_down_through_its_proxy() {
    let registry = Registry::new(test_config()).unwrap();
    let (client, server) = two_processes(&registry);
    let calls = Arc::new(Mutex::new(Vec::new()));
    registry.register_proxy(MockProxy::new("P1", &calls, None));
    registry.register_proxy(MockProxy::new("P2", &calls, None));
    let id = registry.connect("P2", &client, &server).unwrap();
    registry.connect_confirm(id).unwrap();
    calls.lock().clear();

    registry.remove_process("P1").unwrap();
    registry.flush_disconnects();

    assert_eq!(*calls.lock(), vec!["P1:disconnect"]);
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Disconnected));
    assert!(matches!(
        registry.remote_interface_description("P1", "C1", "Main"),
        Err(RegistryError::NotFound { .. })
    ));
}

#[test]
fn test_unconfirmed_connection_times_out() {
    let registry = Registry::new(ManagerConfig {
        disconnect_grace_ms: 0,
        connect_confirm_timeout_secs: 1,
        timeout_check_interval_ms: 50,
        ..ManagerConfig::default()
    })
    .unwrap();
    let (client, server) = two_processes(&registry);
    let pending = registry.connect("P2", &client, &server).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while registry.connection_state(pending) != Some(ConnectionState::Disconnected) {
        assert!(Instant::now() < deadline, "pending connection never timed out");
        thread::sleep(Duration::from_millis(20));
    }
    assert!(registry.connection(pending).is_none());
}

#[test]
fn test_confirmed_connection_survives_timeout_check() {
    let registry = Registry::new(ManagerConfig {
        disconnect_grace_ms: 0,
        connect_confirm_timeout_secs: 1,
        ..ManagerConfig::default()
    })
    .unwrap();
    let (client, server) = two_processes(&registry);
    let id = registry.connect("P2", &client, &server).unwrap();
    registry.connect_confirm(id).unwrap();

    thread::sleep(Duration::from_millis(1100));
    assert_eq!(registry.check_connect_confirm_timeout(), 0);
    assert_eq!(registry.connection_state(id), Some(ConnectionState::Connected));
    assert_ne!(id, ConnectionId::INVALID);
}
