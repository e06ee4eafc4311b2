// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global component registry.
//!
//! Tracks every process, component and interface of a deployment together
//! with the connections between required and provided interfaces:
//!
//! ```text
//! process -> component -> { provided name -> [connection id],
//!                           required name -> [connection id] }
//! connection id -> ConnectionRecord
//! ```
//!
//! All mutations go through [`Registry`] methods. Each map sits behind its
//! own lock, held only for the map edit; remote proxy calls and local
//! teardown never run under a registry lock.
//!
//! Disconnecting is asynchronous: [`Registry::disconnect`] only queues the
//! id, and a dedicated worker thread performs the teardown. Repeated or
//! concurrent requests for the same id are accepted once and ignored
//! afterwards.
//!
//! Lock order: `processes` before `connections`; `waiting` before
//! `disconnected`.

mod connection;
mod dump;
mod worker;

pub use connection::{
    ConnectionDescription, ConnectionId, ConnectionRecord, ConnectionState, InterfaceRef,
    InterfaceRole, ParseInterfaceRefError, RegistryEvent,
};
pub use dump::{
    ComponentSnapshot, ConnectionSnapshot, InterfaceSnapshot, ProcessSnapshot, RegistrySnapshot,
};

use crate::config::ManagerConfig;
use crate::description::InterfaceDescription;
use crate::error::RegistryError;
use crate::naming;
use crate::proxy::{NameQuery, NetworkProxy, ProxyError};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};
use worker::WorkerRequest;

/// Local execution layer of one process: tears down the binding behind a
/// connection between two of its components.
pub trait ExecutionLayer: Send + Sync {
    /// Returns false when the binding could not be removed.
    fn disconnect_local(&self, connection: &ConnectionDescription) -> bool;
}

#[derive(Debug, Default, Clone)]
struct InterfaceLists {
    provided: BTreeMap<String, Vec<ConnectionId>>,
    required: BTreeMap<String, Vec<ConnectionId>>,
}

impl InterfaceLists {
    fn get(&self, role: InterfaceRole) -> &BTreeMap<String, Vec<ConnectionId>> {
        match role {
            InterfaceRole::Provided => &self.provided,
            InterfaceRole::Required => &self.required,
        }
    }

    fn get_mut(&mut self, role: InterfaceRole) -> &mut BTreeMap<String, Vec<ConnectionId>> {
        match role {
            InterfaceRole::Provided => &mut self.provided,
            InterfaceRole::Required => &mut self.required,
        }
    }

    fn first(&self) -> Option<(InterfaceRole, String)> {
        self.provided
            .keys()
            .next()
            .map(|name| (InterfaceRole::Provided, name.clone()))
            .or_else(|| {
                self.required
                    .keys()
                    .next()
                    .map(|name| (InterfaceRole::Required, name.clone()))
            })
    }
}

type ComponentMap = BTreeMap<String, InterfaceLists>;
type ProcessMap = BTreeMap<String, ComponentMap>;

fn ids<'a>(
    processes: &'a ProcessMap,
    interface: &InterfaceRef,
    role: InterfaceRole,
) -> Option<&'a Vec<ConnectionId>> {
    processes
        .get(&interface.process)?
        .get(&interface.component)?
        .get(role)
        .get(&interface.interface)
}

fn ids_mut<'a>(
    processes: &'a mut ProcessMap,
    interface: &InterfaceRef,
    role: InterfaceRole,
) -> Option<&'a mut Vec<ConnectionId>> {
    processes
        .get_mut(&interface.process)?
        .get_mut(&interface.component)?
        .get_mut(role)
        .get_mut(&interface.interface)
}

fn role_name(role: InterfaceRole) -> &'static str {
    match role {
        InterfaceRole::Provided => "provided interface",
        InterfaceRole::Required => "required interface",
    }
}

struct Shared {
    config: ManagerConfig,
    processes: RwLock<ProcessMap>,
    connections: RwLock<BTreeMap<ConnectionId, ConnectionRecord>>,
    next_connection_id: Mutex<u64>,
    waiting: Mutex<BTreeSet<ConnectionId>>,
    disconnected: Mutex<BTreeSet<ConnectionId>>,
    layers: RwLock<BTreeMap<String, Weak<dyn ExecutionLayer>>>,
    proxies: RwLock<BTreeMap<String, Arc<dyn NetworkProxy>>>,
    subscribers: Mutex<Vec<Sender<RegistryEvent>>>,
    requests: Sender<WorkerRequest>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.worker.get_mut().take() {
            // The worker may hold the last reference itself.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Handle to the global registry. Clones share the same state; the
/// disconnect worker stops when the last clone is dropped.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Registry {
    pub fn new(config: ManagerConfig) -> Result<Self, RegistryError> {
        let (requests, receiver) = channel::unbounded();
        let check_interval = config.timeout_check_interval();
        let registry = Self {
            shared: Arc::new(Shared {
                config,
                processes: RwLock::new(ProcessMap::new()),
                connections: RwLock::new(BTreeMap::new()),
                next_connection_id: Mutex::new(0),
                waiting: Mutex::new(BTreeSet::new()),
                disconnected: Mutex::new(BTreeSet::new()),
                layers: RwLock::new(BTreeMap::new()),
                proxies: RwLock::new(BTreeMap::new()),
                subscribers: Mutex::new(Vec::new()),
                requests,
                worker: Mutex::new(None),
            }),
        };
        let handle = worker::spawn(Arc::downgrade(&registry.shared), receiver, check_interval)
            .map_err(|e| RegistryError::Spawn(e.to_string()))?;
        *registry.shared.worker.lock() = Some(handle);
        Ok(registry)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Receives every registry change from now on.
    pub fn subscribe(&self) -> Receiver<RegistryEvent> {
        let (sender, receiver) = channel::unbounded();
        self.shared.subscribers.lock().push(sender);
        receiver
    }

    fn emit(&self, event: RegistryEvent) {
        self.shared
            .subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn emit_all(&self, events: Vec<RegistryEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    // ========================================================================
    // Processes
    // ========================================================================

    pub fn add_process(&self, name: &str) -> Result<(), RegistryError> {
        {
            let mut processes = self.shared.processes.write();
            if processes.contains_key(name) {
                error!("add_process: process \"{name}\" already exists");
                return Err(RegistryError::exists("process", name));
            }
            processes.insert(name.to_string(), ComponentMap::new());
        }
        info!("registry: added process \"{name}\"");
        self.emit(RegistryEvent::ProcessAdded(name.to_string()));
        Ok(())
    }

    pub fn find_process(&self, name: &str) -> bool {
        self.shared.processes.read().contains_key(name)
    }

    /// Removes a process with all its components, interfaces and
    /// connections.
    pub fn remove_process(&self, name: &str) -> Result<(), RegistryError> {
        let mut events = Vec::new();
        {
            let mut processes = self.shared.processes.write();
            if !processes.contains_key(name) {
                warn!("remove_process: process \"{name}\" not found");
                return Err(RegistryError::not_found("process", name));
            }
            while let Some(component) = processes
                .get(name)
                .and_then(|components| components.keys().next().cloned())
            {
                self.remove_component_locked(&mut processes, name, &component, &mut events);
            }
            processes.remove(name);
        }
        // Disconnects queued above still tear down through the layer and
        // proxy; they are released once the worker reaches this request.
        if self
            .shared
            .requests
            .send(WorkerRequest::Release(name.to_string()))
            .is_err()
        {
            self.release_process_endpoints(name);
        }
        info!("registry: removed process \"{name}\"");
        events.push(RegistryEvent::ProcessRemoved(name.to_string()));
        self.emit_all(events);
        Ok(())
    }

    pub fn process_names(&self) -> Vec<String> {
        self.shared.processes.read().keys().cloned().collect()
    }

    // ========================================================================
    // Components
    // ========================================================================

    pub fn add_component(&self, process: &str, component: &str) -> Result<(), RegistryError> {
        {
            let mut processes = self.shared.processes.write();
            let Some(components) = processes.get_mut(process) else {
                error!("add_component: process \"{process}\" not found");
                return Err(RegistryError::not_found("process", process));
            };
            if components.contains_key(component) {
                error!("add_component: component \"{process}:{component}\" already exists");
                return Err(RegistryError::exists(
                    "component",
                    format!("{process}:{component}"),
                ));
            }
            components.insert(component.to_string(), InterfaceLists::default());
        }
        info!("registry: added component \"{process}:{component}\"");
        self.emit(RegistryEvent::ComponentAdded {
            process: process.to_string(),
            component: component.to_string(),
        });
        Ok(())
    }

    pub fn find_component(&self, process: &str, component: &str) -> bool {
        self.shared
            .processes
            .read()
            .get(process)
            .is_some_and(|components| components.contains_key(component))
    }

    pub fn remove_component(&self, process: &str, component: &str) -> Result<(), RegistryError> {
        let mut events = Vec::new();
        {
            let mut processes = self.shared.processes.write();
            if !processes
                .get(process)
                .is_some_and(|components| components.contains_key(component))
            {
                warn!("remove_component: component \"{process}:{component}\" not found");
                return Err(RegistryError::not_found(
                    "component",
                    format!("{process}:{component}"),
                ));
            }
            self.remove_component_locked(&mut processes, process, component, &mut events);
        }
        self.emit_all(events);
        Ok(())
    }

    fn remove_component_locked(
        &self,
        processes: &mut ProcessMap,
        process: &str,
        component: &str,
        events: &mut Vec<RegistryEvent>,
    ) {
        while let Some((role, interface)) = processes
            .get(process)
            .and_then(|components| components.get(component))
            .and_then(InterfaceLists::first)
        {
            let interface = InterfaceRef::new(process, component, &interface);
            self.remove_interface_locked(processes, &interface, role, events);
        }
        if let Some(components) = processes.get_mut(process) {
            components.remove(component);
        }
        debug!("registry: removed component \"{process}:{component}\"");
        events.push(RegistryEvent::ComponentRemoved {
            process: process.to_string(),
            component: component.to_string(),
        });
    }

    pub fn component_names(&self, process: &str) -> Vec<String> {
        self.shared
            .processes
            .read()
            .get(process)
            .map(|components| components.keys().cloned().collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Interfaces
    // ========================================================================

    pub fn add_interface_provided(
        &self,
        process: &str,
        component: &str,
        interface: &str,
    ) -> Result<(), RegistryError> {
        self.add_interface(
            &InterfaceRef::new(process, component, interface),
            InterfaceRole::Provided,
        )
    }

    pub fn add_interface_required(
        &self,
        process: &str,
        component: &str,
        interface: &str,
    ) -> Result<(), RegistryError> {
        self.add_interface(
            &InterfaceRef::new(process, component, interface),
            InterfaceRole::Required,
        )
    }

    fn add_interface(
        &self,
        interface: &InterfaceRef,
        role: InterfaceRole,
    ) -> Result<(), RegistryError> {
        {
            let mut processes = self.shared.processes.write();
            let Some(lists) = processes
                .get_mut(&interface.process)
                .and_then(|components| components.get_mut(&interface.component))
            else {
                error!(
                    "add_interface: component \"{}:{}\" not found",
                    interface.process, interface.component
                );
                return Err(RegistryError::not_found(
                    "component",
                    format!("{}:{}", interface.process, interface.component),
                ));
            };
            let map = lists.get_mut(role);
            if map.contains_key(&interface.interface) {
                error!("add_interface: {} \"{}\" already exists", role_name(role), interface);
                return Err(RegistryError::exists(role_name(role), interface.uid()));
            }
            map.insert(interface.interface.clone(), Vec::new());
        }
        debug!("registry: added {} \"{}\"", role_name(role), interface);
        self.emit(RegistryEvent::InterfaceAdded {
            interface: interface.clone(),
            role,
        });
        Ok(())
    }

    pub fn find_interface_provided(&self, process: &str, component: &str, interface: &str) -> bool {
        let interface = InterfaceRef::new(process, component, interface);
        self.find_interface(&interface, InterfaceRole::Provided)
    }

    pub fn find_interface_required(&self, process: &str, component: &str, interface: &str) -> bool {
        let interface = InterfaceRef::new(process, component, interface);
        self.find_interface(&interface, InterfaceRole::Required)
    }

    fn find_interface(&self, interface: &InterfaceRef, role: InterfaceRole) -> bool {
        ids(&self.shared.processes.read(), interface, role).is_some()
    }

    pub fn remove_interface_provided(
        &self,
        process: &str,
        component: &str,
        interface: &str,
    ) -> Result<(), RegistryError> {
        self.remove_interface(
            &InterfaceRef::new(process, component, interface),
            InterfaceRole::Provided,
        )
    }

    pub fn remove_interface_required(
        &self,
        process: &str,
        component: &str,
        interface: &str,
    ) -> Result<(), RegistryError> {
        self.remove_interface(
            &InterfaceRef::new(process, component, interface),
            InterfaceRole::Required,
        )
    }

    fn remove_interface(
        &self,
        interface: &InterfaceRef,
        role: InterfaceRole,
    ) -> Result<(), RegistryError> {
        let mut events = Vec::new();
        let removed = {
            let mut processes = self.shared.processes.write();
            self.remove_interface_locked(&mut processes, interface, role, &mut events)
        };
        if !removed {
            warn!("remove_interface: {} \"{}\" not found", role_name(role), interface);
            return Err(RegistryError::not_found(role_name(role), interface.uid()));
        }
        self.emit_all(events);
        Ok(())
    }

    /// Queues a disconnect for every connection of the interface, then drops
    /// the interface record.
    fn remove_interface_locked(
        &self,
        processes: &mut ProcessMap,
        interface: &InterfaceRef,
        role: InterfaceRole,
        events: &mut Vec<RegistryEvent>,
    ) -> bool {
        let Some(lists) = processes
            .get_mut(&interface.process)
            .and_then(|components| components.get_mut(&interface.component))
        else {
            return false;
        };
        let Some(connections) = lists.get_mut(role).remove(&interface.interface) else {
            return false;
        };
        for id in connections {
            if let Err(e) = self.disconnect(id) {
                warn!("remove_interface: {}: {}", interface, e);
            }
        }
        debug!("registry: removed {} \"{}\"", role_name(role), interface);
        events.push(RegistryEvent::InterfaceRemoved {
            interface: interface.clone(),
            role,
        });
        true
    }

    pub fn interface_names(
        &self,
        process: &str,
        component: &str,
        role: InterfaceRole,
    ) -> Vec<String> {
        self.shared
            .processes
            .read()
            .get(process)
            .and_then(|components| components.get(component))
            .map(|lists| lists.get(role).keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of provided plus required interfaces of a component, `None` if
    /// the component does not exist.
    pub fn interface_count(
        &self,
        process: &str,
        component: &str,
        include_internal: bool,
    ) -> Option<usize> {
        let processes = self.shared.processes.read();
        let Some(lists) = processes.get(process).and_then(|c| c.get(component)) else {
            warn!("interface_count: component \"{process}:{component}\" not found");
            return None;
        };
        let count = |role: InterfaceRole| {
            lists
                .get(role)
                .keys()
                .filter(|name| {
                    let provided = role == InterfaceRole::Provided;
                    include_internal || !naming::is_internal_interface(component, name, provided)
                })
                .count()
        };
        Some(count(InterfaceRole::Provided) + count(InterfaceRole::Required))
    }

    /// Connection ids currently recorded on an interface.
    pub fn connection_ids(
        &self,
        interface: &InterfaceRef,
        role: InterfaceRole,
    ) -> Option<Vec<ConnectionId>> {
        ids(&self.shared.processes.read(), interface, role).cloned()
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Records a new pending connection from `client` (required) to `server`
    /// (provided) and returns its id.
    ///
    /// Arguments given the wrong way round are accepted when only the
    /// swapped pair exists.
    pub fn connect(
        &self,
        requester: &str,
        client: &InterfaceRef,
        server: &InterfaceRef,
    ) -> Result<ConnectionId, RegistryError> {
        let (client, server) = self.resolve_connection_ends(client, server)?;

        let description = {
            let mut processes = self.shared.processes.write();
            let (Some(client_ids), Some(server_ids)) = (
                ids(&processes, &client, InterfaceRole::Required),
                ids(&processes, &server, InterfaceRole::Provided),
            ) else {
                error!("connect: {client} or {server} was removed meanwhile");
                return Err(RegistryError::not_found("interface", format!("{client} - {server}")));
            };
            if client_ids.iter().any(|id| server_ids.contains(id)) {
                error!("connect: {client} is already connected to {server}");
                return Err(RegistryError::AlreadyConnected {
                    client: client.uid(),
                    server: server.uid(),
                });
            }

            let id = {
                let mut next = self.shared.next_connection_id.lock();
                if *next >= ConnectionId::INVALID.0 {
                    error!("connect: connection id space exhausted");
                    return Err(RegistryError::IdExhausted);
                }
                let id = ConnectionId(*next);
                *next += 1;
                id
            };
            if let Some(list) = ids_mut(&mut processes, &client, InterfaceRole::Required) {
                list.push(id);
            }
            if let Some(list) = ids_mut(&mut processes, &server, InterfaceRole::Provided) {
                list.push(id);
            }

            let description = ConnectionDescription { id, client, server };
            self.shared
                .connections
                .write()
                .insert(id, ConnectionRecord::pending(description.clone(), requester));
            description
        };

        info!("connect: {description} (requested by \"{requester}\")");
        self.emit(RegistryEvent::Connected(description.clone()));

        if !description.is_local() {
            if let Err(e) = self.establish_proxies(&description) {
                if let Err(cleanup) = self.disconnect(description.id) {
                    debug!("connect: cleanup of [{}]: {cleanup}", description.id);
                }
                return Err(e);
            }
        }
        Ok(description.id)
    }

    fn resolve_connection_ends(
        &self,
        client: &InterfaceRef,
        server: &InterfaceRef,
    ) -> Result<(InterfaceRef, InterfaceRef), RegistryError> {
        let processes = self.shared.processes.read();
        let required = |i: &InterfaceRef| ids(&processes, i, InterfaceRole::Required).is_some();
        let provided = |i: &InterfaceRef| ids(&processes, i, InterfaceRole::Provided).is_some();

        if required(client) && provided(server) {
            return Ok((client.clone(), server.clone()));
        }

        // Processes stay as given; only component/interface names swap.
        let swapped_client =
            InterfaceRef::new(&client.process, &server.component, &server.interface);
        let swapped_server =
            InterfaceRef::new(&server.process, &client.component, &client.interface);
        if required(&swapped_client) && provided(&swapped_server) {
            warn!("connect: ends look swapped, connecting {swapped_client} to {swapped_server}");
            return Ok((swapped_client, swapped_server));
        }

        let names = |i: &InterfaceRef, role: InterfaceRole| -> Vec<String> {
            processes
                .get(&i.process)
                .and_then(|components| components.get(&i.component))
                .map(|lists| lists.get(role).keys().cloned().collect())
                .unwrap_or_default()
        };
        if !required(client) {
            error!(
                "connect: required interface {client} not found, available: {:?}",
                names(client, InterfaceRole::Required)
            );
            Err(RegistryError::not_found("required interface", client.uid()))
        } else {
            error!(
                "connect: provided interface {server} not found, available: {:?}",
                names(server, InterfaceRole::Provided)
            );
            Err(RegistryError::not_found("provided interface", server.uid()))
        }
    }

    /// Pending -> Connected.
    pub fn connect_confirm(&self, id: ConnectionId) -> Result<(), RegistryError> {
        {
            let mut connections = self.shared.connections.write();
            let Some(record) = connections.get_mut(&id) else {
                error!("connect_confirm: unknown connection id {id}");
                return Err(RegistryError::UnknownConnection(id));
            };
            record.state = ConnectionState::Connected;
        }
        info!("connect_confirm: [{id}] connected");
        self.emit(RegistryEvent::ConnectConfirmed(id));
        Ok(())
    }

    /// Queues the connection for teardown and returns immediately.
    ///
    /// Requests for an id that is already queued or torn down succeed
    /// without doing anything.
    pub fn disconnect(&self, id: ConnectionId) -> Result<(), RegistryError> {
        let known = self.shared.connections.read().contains_key(&id);
        {
            let mut waiting = self.shared.waiting.lock();
            if waiting.contains(&id) || self.shared.disconnected.lock().contains(&id) {
                debug!("disconnect: [{id}] already requested");
                return Ok(());
            }
            if !known {
                warn!("disconnect: unknown connection id {id}");
                return Err(RegistryError::UnknownConnection(id));
            }
            waiting.insert(id);
        }
        debug!("disconnect: [{id}] queued");
        if self.shared.requests.send(WorkerRequest::Disconnect(id)).is_err() {
            error!("disconnect: worker stopped, [{id}] stays queued");
        }
        Ok(())
    }

    pub fn disconnect_by_name(
        &self,
        client: &InterfaceRef,
        server: &InterfaceRef,
    ) -> Result<(), RegistryError> {
        match self.connection_id(client, server) {
            Some(id) => self.disconnect(id),
            None => {
                warn!("disconnect: no connection between {client} and {server}");
                Err(RegistryError::not_found("connection", format!("{client} - {server}")))
            }
        }
    }

    pub fn disconnect_description(
        &self,
        description: &ConnectionDescription,
    ) -> Result<(), RegistryError> {
        if description.id.is_valid() {
            self.disconnect(description.id)
        } else {
            self.disconnect_by_name(&description.client, &description.server)
        }
    }

    pub fn connection_id(
        &self,
        client: &InterfaceRef,
        server: &InterfaceRef,
    ) -> Option<ConnectionId> {
        self.shared
            .connections
            .read()
            .values()
            .find(|r| r.description.client == *client && r.description.server == *server)
            .map(|r| r.description.id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<ConnectionRecord> {
        self.shared.connections.read().get(&id).cloned()
    }

    pub fn connection_state(&self, id: ConnectionId) -> Option<ConnectionState> {
        {
            let waiting = self.shared.waiting.lock();
            let disconnected = self.shared.disconnected.lock();
            if disconnected.contains(&id) {
                return Some(ConnectionState::Disconnected);
            }
            if waiting.contains(&id) {
                return Some(ConnectionState::DisconnectWaiting);
            }
        }
        self.shared.connections.read().get(&id).map(|r| r.state)
    }

    /// Confirmed connections only.
    pub fn list_connections(&self) -> Vec<ConnectionDescription> {
        self.shared
            .connections
            .read()
            .values()
            .filter(|r| r.state == ConnectionState::Connected)
            .map(|r| r.description.clone())
            .collect()
    }

    /// Disconnects pending connections older than the configured confirm
    /// timeout. Returns how many were queued.
    pub fn check_connect_confirm_timeout(&self) -> usize {
        let Some(timeout) = self.shared.config.connect_confirm_timeout() else {
            return 0;
        };
        let expired: Vec<ConnectionId> = self
            .shared
            .connections
            .read()
            .values()
            .filter(|r| r.state == ConnectionState::Pending && r.created.elapsed() > timeout)
            .map(|r| r.description.id)
            .collect();
        for id in &expired {
            warn!("connect_confirm timeout: [{id}] was never confirmed, disconnecting");
            if let Err(e) = self.disconnect(*id) {
                debug!("connect_confirm timeout: [{id}]: {e}");
            }
        }
        expired.len()
    }

    /// Blocks until every disconnect queued before this call is handled.
    ///
    /// Must not be called from an [`ExecutionLayer`] callback.
    pub fn flush_disconnects(&self) {
        let (done, finished) = channel::bounded(1);
        if self.shared.requests.send(WorkerRequest::Flush(done)).is_ok() {
            let _ = finished.recv();
        }
    }

    // ========================================================================
    // Execution layers and network proxies
    // ========================================================================

    /// Registers the layer tearing down local bindings of `process`. The
    /// registry keeps a weak reference.
    pub fn register_execution_layer<L>(&self, process: &str, layer: &Arc<L>)
    where
        L: ExecutionLayer + 'static,
    {
        let layer: Arc<dyn ExecutionLayer> = Arc::clone(layer) as Arc<dyn ExecutionLayer>;
        self.shared
            .layers
            .write()
            .insert(process.to_string(), Arc::downgrade(&layer));
    }

    /// Drops the layer and proxy of a removed process. Kept when the
    /// process was registered again in the meantime.
    fn release_process_endpoints(&self, process: &str) {
        if self.find_process(process) {
            debug!("registry: \"{process}\" was added again, keeping its endpoints");
            return;
        }
        self.shared.proxies.write().remove(process);
        self.shared.layers.write().remove(process);
    }

    fn execution_layer(&self, process: &str) -> Option<Arc<dyn ExecutionLayer>> {
        self.shared.layers.read().get(process)?.upgrade()
    }

    pub fn register_proxy(&self, proxy: Arc<dyn NetworkProxy>) {
        info!("registry: network proxy registered for \"{}\"", proxy.process_name());
        self.shared
            .proxies
            .write()
            .insert(proxy.process_name().to_string(), proxy);
    }

    fn proxy(&self, process: &str) -> Option<Arc<dyn NetworkProxy>> {
        self.shared.proxies.read().get(process).cloned()
    }

    /// A remote process went away: drop its proxy and everything it owns.
    pub fn on_client_disconnect(&self, process: &str) {
        warn!("registry: lost process \"{process}\", removing it");
        self.shared.proxies.write().remove(process);
        if self.find_process(process) {
            if let Err(e) = self.remove_process(process) {
                warn!("on_client_disconnect: {e}");
            }
        }
    }

    fn call_proxy<T>(
        &self,
        proxy: &Arc<dyn NetworkProxy>,
        call: impl FnOnce(&dyn NetworkProxy) -> Result<T, ProxyError>,
    ) -> Result<T, RegistryError> {
        call(proxy.as_ref()).map_err(|e| {
            let process = proxy.process_name().to_string();
            error!("network proxy for \"{process}\": {e}");
            self.on_client_disconnect(&process);
            RegistryError::Network {
                process,
                reason: e.to_string(),
            }
        })
    }

    /// Builds the component and interface proxies of a cross-process
    /// connection. Skipped when no proxy is registered for either side.
    fn establish_proxies(&self, description: &ConnectionDescription) -> Result<(), RegistryError> {
        let (client, server) = (&description.client, &description.server);
        let (Some(client_proxy), Some(server_proxy)) =
            (self.proxy(&client.process), self.proxy(&server.process))
        else {
            debug!("connect: no network proxies for {description}, registry bookkeeping only");
            return Ok(());
        };

        let interface = self.call_proxy(&server_proxy, |p| {
            p.provided_interface_description(&server.component, &server.interface)
        })?;
        let server_component_proxy =
            naming::component_proxy_name(&server.process, &server.component);
        self.call_proxy(&client_proxy, |p| p.create_component_proxy(&server_component_proxy))?;
        self.call_proxy(&client_proxy, |p| {
            p.create_provided_interface_proxy(&server_component_proxy, &interface)
        })?;

        let client_component_proxy =
            naming::component_proxy_name(&client.process, &client.component);
        self.call_proxy(&server_proxy, |p| p.create_component_proxy(&client_component_proxy))?;
        self.call_proxy(&server_proxy, |p| {
            p.create_required_interface_proxy(&client_component_proxy, &client.interface)
        })?;

        self.call_proxy(&server_proxy, |p| p.connect_server_side_interface(description))?;
        self.call_proxy(&client_proxy, |p| p.connect_client_side_interface(description))?;
        Ok(())
    }

    /// Names reported by the remote side of an interface.
    pub fn remote_interface_names(
        &self,
        process: &str,
        component: &str,
        interface: &str,
        query: NameQuery,
    ) -> Result<Vec<String>, RegistryError> {
        let proxy = self
            .proxy(process)
            .ok_or_else(|| RegistryError::not_found("network proxy", process))?;
        self.call_proxy(&proxy, |p| p.interface_names(component, interface, query))
    }

    pub fn remote_interface_description(
        &self,
        process: &str,
        component: &str,
        interface: &str,
    ) -> Result<InterfaceDescription, RegistryError> {
        let proxy = self
            .proxy(process)
            .ok_or_else(|| RegistryError::not_found("network proxy", process))?;
        self.call_proxy(&proxy, |p| p.provided_interface_description(component, interface))
    }

    #[cfg(test)]
    pub(crate) fn set_next_connection_id(&self, next: u64) {
        *self.shared.next_connection_id.lock() = next;
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("processes", &self.shared.processes.read().len())
            .field("connections", &self.shared.connections.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(ManagerConfig {
            disconnect_grace_ms: 0,
            ..ManagerConfig::default()
        })
        .unwrap()
    }

    fn two_process_setup(registry: &Registry) -> (InterfaceRef, InterfaceRef) {
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

    #[test]
    fn test_add_requires_parent() {
        let registry = registry();
        assert!(matches!(
            registry.add_component("P", "C"),
            Err(RegistryError::NotFound { .. })
        ));
        registry.add_process("P").unwrap();
        assert!(matches!(
            registry.add_process("P"),
            Err(RegistryError::AlreadyExists { .. })
        ));
        assert!(registry.add_interface_provided("P", "C", "I").is_err());
        registry.add_component("P", "C").unwrap();
        registry.add_interface_provided("P", "C", "I").unwrap();
        assert!(registry.add_interface_provided("P", "C", "I").is_err());
        // Same name as required is a different record.
        registry.add_interface_required("P", "C", "I").unwrap();
    }

    #[test]
    fn test_interface_round_trip() {
        let registry = registry();
        registry.add_process("P").unwrap();
        registry.add_component("P", "C").unwrap();
        registry.add_interface_provided("P", "C", "I").unwrap();
        assert!(registry.find_interface_provided("P", "C", "I"));
        assert!(!registry.find_interface_required("P", "C", "I"));

        registry.remove_interface_provided("P", "C", "I").unwrap();
        assert!(!registry.find_interface_provided("P", "C", "I"));
        assert!(registry.remove_interface_provided("P", "C", "I").is_err());
    }

    #[test]
    fn test_swapped_arguments_are_recovered() {
        let registry = registry();
        registry.add_process("P").unwrap();
        registry.add_component("P", "Server").unwrap();
        registry.add_component("P", "Client").unwrap();
        registry.add_interface_provided("P", "Server", "Out").unwrap();
        registry.add_interface_required("P", "Client", "In").unwrap();

        let id = registry
            .connect(
                "P",
                &InterfaceRef::new("P", "Server", "Out"),
                &InterfaceRef::new("P", "Client", "In"),
            )
            .unwrap();
        let record = registry.connection(id).unwrap();
        assert_eq!(record.description.client, InterfaceRef::new("P", "Client", "In"));
        assert_eq!(record.description.server, InterfaceRef::new("P", "Server", "Out"));
    }

    #[test]
    fn test_connect_unknown_interface_fails() {
        let registry = registry();
        let (client, _) = two_process_setup(&registry);
        let err = registry
            .connect("P2", &client, &InterfaceRef::new("P1", "C1", "Missing"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        assert!(registry.connection_ids(&client, InterfaceRole::Required).unwrap().is_empty());
    }

    #[test]
    fn test_already_connected() {
        let registry = registry();
        let (client, server) = two_process_setup(&registry);
        let id = registry.connect("P2", &client, &server).unwrap();
        assert!(matches!(
            registry.connect("P2", &client, &server),
            Err(RegistryError::AlreadyConnected { .. })
        ));

        let required = registry.connection_ids(&client, InterfaceRole::Required).unwrap();
        let provided = registry.connection_ids(&server, InterfaceRole::Provided).unwrap();
        let shared: Vec<_> = required.iter().filter(|id| provided.contains(id)).collect();
        assert_eq!(shared, vec![&id]);
    }

    #[test]
    fn test_ids_strictly_increase() {
        let registry = registry();
        registry.add_process("P").unwrap();
        registry.add_component("P", "S").unwrap();
        registry.add_component("P", "C").unwrap();
        registry.add_interface_provided("P", "S", "Out").unwrap();
        registry.add_interface_required("P", "C", "A").unwrap();
        registry.add_interface_required("P", "C", "B").unwrap();
        let server = InterfaceRef::new("P", "S", "Out");

        let first = registry.connect("P", &InterfaceRef::new("P", "C", "A"), &server).unwrap();
        let second = registry.connect("P", &InterfaceRef::new("P", "C", "B"), &server).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_id_exhaustion_is_hard_failure() {
        let registry = registry();
        registry.add_process("P").unwrap();
        registry.add_component("P", "S").unwrap();
        registry.add_component("P", "C").unwrap();
        registry.add_interface_provided("P", "S", "Out").unwrap();
        registry.add_interface_required("P", "C", "A").unwrap();
        registry.add_interface_required("P", "C", "B").unwrap();
        let server = InterfaceRef::new("P", "S", "Out");
        registry.set_next_connection_id(u64::MAX - 1);

        let last = registry.connect("P", &InterfaceRef::new("P", "C", "A"), &server).unwrap();
        assert_eq!(last, ConnectionId(u64::MAX - 1));
        assert_eq!(
            registry.connect("P", &InterfaceRef::new("P", "C", "B"), &server),
            Err(RegistryError::IdExhausted)
        );
    }

    #[test]
    fn test_confirm_and_list() {
        let registry = registry();
        let (client, server) = two_process_setup(&registry);
        let id = registry.connect("P2", &client, &server).unwrap();
        assert_eq!(registry.connection_state(id), Some(ConnectionState::Pending));
        assert!(registry.list_connections().is_empty());

        registry.connect_confirm(id).unwrap();
        assert_eq!(registry.connection_state(id), Some(ConnectionState::Connected));
        assert_eq!(registry.list_connections().len(), 1);
        assert_eq!(
            registry.connect_confirm(ConnectionId(99)),
            Err(RegistryError::UnknownConnection(ConnectionId(99)))
        );
    }

    #[test]
    fn test_disconnect_unknown_id() {
        let registry = registry();
        assert_eq!(
            registry.disconnect(ConnectionId(7)),
            Err(RegistryError::UnknownConnection(ConnectionId(7)))
        );
    }

    #[test]
    fn test_interface_count_excludes_internal() {
        let registry = registry();
        registry.add_process("P").unwrap();
        registry.add_component("P", "Robot").unwrap();
        registry.add_interface_provided("P", "Robot", "Main").unwrap();
        registry
            .add_interface_provided("P", "Robot", naming::INTERFACE_INTERNAL_PROVIDED)
            .unwrap();
        registry
            .add_interface_required("P", "Robot", naming::INTERFACE_INTERNAL_REQUIRED)
            .unwrap();

        assert_eq!(registry.interface_count("P", "Robot", true), Some(3));
        assert_eq!(registry.interface_count("P", "Robot", false), Some(1));
        assert_eq!(registry.interface_count("P", "Nope", true), None);
    }

    #[test]
    fn test_subscribe_receives_changes() {
        let registry = registry();
        let events = registry.subscribe();
        registry.add_process("P").unwrap();
        registry.add_component("P", "C").unwrap();

        assert_eq!(events.try_recv().unwrap(), RegistryEvent::ProcessAdded("P".into()));
        assert_eq!(
            events.try_recv().unwrap(),
            RegistryEvent::ComponentAdded {
                process: "P".into(),
                component: "C".into()
            }
        );
    }
}
