// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Components and the per-process execution layer.
//!
//! A [`Component`] groups provided interfaces and named required-interface
//! slots. A [`LocalManager`] owns the components of one process, mirrors
//! them into the global [`Registry`] and turns registry connections into
//! bindings: connecting hands the client a [`Binding`] of the server's
//! provided interface, disconnecting removes it again.

use crate::error::{InterfaceError, RegistryError};
use crate::interface::{Binding, Interface, InterfaceOptions};
use crate::registry::{ConnectionDescription, ConnectionId, ExecutionLayer, InterfaceRef, Registry};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Component {
    name: String,
    provided: RwLock<BTreeMap<String, Interface>>,
    /// Required interface slots, filled while connected.
    required: RwLock<BTreeMap<String, Option<Binding>>>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provided: RwLock::new(BTreeMap::new()),
            required: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_new(&self, what: &'static str, name: &str, taken: bool) -> Result<(), InterfaceError> {
        if name.is_empty() {
            error!("component \"{}\": empty {} name", self.name, what);
            return Err(InterfaceError::EmptyName {
                interface: self.name.clone(),
                what,
            });
        }
        if taken {
            error!("component \"{}\": {} \"{}\" already exists", self.name, what, name);
            return Err(InterfaceError::Duplicate {
                interface: self.name.clone(),
                what,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_interface_provided(
        &self,
        name: &str,
        options: InterfaceOptions,
    ) -> Result<Interface, InterfaceError> {
        let mut provided = self.provided.write();
        self.check_new("provided interface", name, provided.contains_key(name))?;
        let interface = Interface::new(self.name.as_str(), name, options);
        provided.insert(name.to_string(), interface.clone());
        Ok(interface)
    }

    pub fn add_interface_required(&self, name: &str) -> Result<(), InterfaceError> {
        let mut required = self.required.write();
        self.check_new("required interface", name, required.contains_key(name))?;
        required.insert(name.to_string(), None);
        Ok(())
    }

    pub fn interface_provided(&self, name: &str) -> Option<Interface> {
        self.provided.read().get(name).cloned()
    }

    /// Binding currently plugged into required interface `name`.
    pub fn required_binding(&self, name: &str) -> Option<Binding> {
        self.required.read().get(name).cloned().flatten()
    }

    pub fn names_of_interfaces_provided(&self) -> Vec<String> {
        self.provided.read().keys().cloned().collect()
    }

    pub fn names_of_interfaces_required(&self) -> Vec<String> {
        self.required.read().keys().cloned().collect()
    }

    /// Runs once per cycle of the component's thread: drains the mailboxes
    /// of every provided interface.
    pub fn process_mailboxes(&self) -> usize {
        let interfaces: Vec<Interface> = self.provided.read().values().cloned().collect();
        interfaces.iter().map(Interface::process_mailboxes).sum()
    }

    pub(crate) fn bind_required(&self, name: &str, binding: Binding) -> Result<(), InterfaceError> {
        let mut required = self.required.write();
        let Some(slot) = required.get_mut(name) else {
            return Err(InterfaceError::BindingNotFound {
                interface: format!("{}:{}", self.name, name),
                binding: binding.name().to_string(),
            });
        };
        if slot.is_some() {
            return Err(InterfaceError::Duplicate {
                interface: format!("{}:{}", self.name, name),
                what: "binding",
                name: binding.name().to_string(),
            });
        }
        *slot = Some(binding);
        Ok(())
    }

    pub(crate) fn unbind_required(&self, name: &str) -> Option<Binding> {
        self.required.write().get_mut(name)?.take()
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("provided", &self.names_of_interfaces_provided())
            .field("required", &self.names_of_interfaces_required())
            .finish()
    }
}

// ============================================================================
// LocalManager
// ============================================================================

/// Components of one process.
pub struct LocalManager {
    process: String,
    registry: Registry,
    components: RwLock<BTreeMap<String, Arc<Component>>>,
}

impl LocalManager {
    /// Registers `process` and this manager as its execution layer.
    pub fn new(process: &str, registry: Registry) -> Result<Arc<Self>, RegistryError> {
        registry.add_process(process)?;
        let manager = Arc::new(Self {
            process: process.to_string(),
            registry,
            components: RwLock::new(BTreeMap::new()),
        });
        manager.registry.register_execution_layer(process, &manager);
        Ok(manager)
    }

    pub fn process_name(&self) -> &str {
        &self.process
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Adds `component` and mirrors its interfaces into the registry.
    pub fn add_component(&self, component: Component) -> Result<Arc<Component>, RegistryError> {
        let name = component.name().to_string();
        self.registry.add_component(&self.process, &name)?;
        for interface in component.names_of_interfaces_provided() {
            self.registry.add_interface_provided(&self.process, &name, &interface)?;
        }
        for interface in component.names_of_interfaces_required() {
            self.registry.add_interface_required(&self.process, &name, &interface)?;
        }
        let component = Arc::new(component);
        self.components.write().insert(name, Arc::clone(&component));
        Ok(component)
    }

    pub fn component(&self, name: &str) -> Option<Arc<Component>> {
        self.components.read().get(name).cloned()
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.read().keys().cloned().collect()
    }

    /// Removes a component. Blocks until its connections are torn down.
    pub fn remove_component(&self, name: &str) -> Result<(), RegistryError> {
        self.registry.remove_component(&self.process, name)?;
        self.registry.flush_disconnects();
        self.components.write().remove(name);
        Ok(())
    }

    /// Connects required interface `client_interface` of `client_component`
    /// to provided interface `server_interface` of `server_component`.
    pub fn connect(
        &self,
        client_component: &str,
        client_interface: &str,
        server_component: &str,
        server_interface: &str,
    ) -> Result<ConnectionId, RegistryError> {
        let client = InterfaceRef::new(&self.process, client_component, client_interface);
        let server = InterfaceRef::new(&self.process, server_component, server_interface);
        let id = self.registry.connect(&self.process, &client, &server)?;

        // The registry may have swapped the ends.
        let description = match self.registry.connection(id) {
            Some(record) => record.description,
            None => return Err(RegistryError::UnknownConnection(id)),
        };

        if let Err(e) = self.bind(&description) {
            error!("connect: binding {description} failed: {e}");
            let _ = self.registry.disconnect(id);
            return Err(e);
        }
        self.registry.connect_confirm(id)?;
        Ok(id)
    }

    fn bind(&self, description: &ConnectionDescription) -> Result<(), RegistryError> {
        let (client, server) = (&description.client, &description.server);
        let server_interface = self
            .component(&server.component)
            .and_then(|c| c.interface_provided(&server.interface))
            .ok_or_else(|| RegistryError::not_found("provided interface", server.uid()))?;
        let client_component = self
            .component(&client.component)
            .ok_or_else(|| RegistryError::not_found("component", client.component.as_str()))?;

        let binding = server_interface.create_binding(&client.component);
        if let Err(e) = client_component.bind_required(&client.interface, binding.clone()) {
            let _ = server_interface.remove_binding(&binding);
            return Err(e.into());
        }
        debug!("connect: {} bound to {}", client, binding.name());
        Ok(())
    }

    pub fn disconnect(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.registry.disconnect(id)
    }

    /// One cycle over every component.
    pub fn process_mailboxes(&self) -> usize {
        let components: Vec<Arc<Component>> = self.components.read().values().cloned().collect();
        components.iter().map(|c| c.process_mailboxes()).sum()
    }
}

impl ExecutionLayer for LocalManager {
    fn disconnect_local(&self, connection: &ConnectionDescription) -> bool {
        let (client, server) = (&connection.client, &connection.server);
        let Some(binding) = self
            .component(&client.component)
            .and_then(|c| c.unbind_required(&client.interface))
        else {
            warn!("disconnect: {client} has no binding");
            return false;
        };
        let Some(interface) = self
            .component(&server.component)
            .and_then(|c| c.interface_provided(&server.interface))
        else {
            warn!("disconnect: provided interface {server} not found");
            return false;
        };
        match interface.remove_binding(&binding) {
            Ok(()) => {
                info!("disconnect: released {} of {}", binding.name(), server);
                true
            }
            Err(e) => {
                warn!("disconnect: {e}");
                false
            }
        }
    }
}

impl std::fmt::Debug for LocalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalManager")
            .field("process", &self.process)
            .field("components", &self.component_names())
            .finish()
    }
}
