// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Naming conventions shared by interfaces and the registry.

/// Manager component server, one per deployment.
pub const MANAGER_COMPONENT_SERVER: &str = "MCS";
/// Manager component client, one per process.
pub const MANAGER_COMPONENT_CLIENT: &str = "MCC";

pub const INTERFACE_INTERNAL_PROVIDED: &str = "InterfaceInternalProvided";
pub const INTERFACE_INTERNAL_REQUIRED: &str = "InterfaceInternalRequired";
pub const INTERFACE_GCM_PREFIX: &str = "InterfaceGCM";
pub const INTERFACE_LCM_PREFIX: &str = "InterfaceLCM";
pub const INTERFACE_COMPONENT_PREFIX: &str = "InterfaceComponent";
pub const INTERFACE_COMPONENT_REQUIRED_FOR: &str = "InterfaceComponentRequiredFor";

const PROXY_SUFFIX: &str = "Proxy";

/// Uniform interface id, `process:component:interface`.
pub fn interface_uid(process: &str, component: &str, interface: &str) -> String {
    format!("{process}:{component}:{interface}")
}

/// Name of the proxy standing for `component` of `process` in another
/// process.
pub fn component_proxy_name(process: &str, component: &str) -> String {
    if component.ends_with(PROXY_SUFFIX) {
        format!("{process}.{component}")
    } else {
        format!("{process}.{component}{PROXY_SUFFIX}")
    }
}

pub fn is_component_proxy(component: &str) -> bool {
    component.ends_with(PROXY_SUFFIX)
}

/// Binding name, `interface[user]`.
pub fn binding_name(interface: &str, user: &str) -> String {
    format!("{interface}[{user}]")
}

/// Required interface the manager component client creates to reach
/// `component`.
pub fn interface_component_required_for(component: &str) -> String {
    format!("{INTERFACE_COMPONENT_REQUIRED_FOR}{component}")
}

pub fn is_manager_component_server(component: &str) -> bool {
    component == MANAGER_COMPONENT_SERVER
}

pub fn is_manager_component_client(component: &str) -> bool {
    component.starts_with(MANAGER_COMPONENT_CLIENT)
}

/// True for interfaces that only carry the middleware's own management
/// traffic. The rule depends on the owning component.
pub fn is_internal_interface(component: &str, interface: &str, provided: bool) -> bool {
    if is_manager_component_server(component) {
        interface.starts_with(INTERFACE_GCM_PREFIX)
    } else if is_manager_component_client(component) {
        interface.starts_with(INTERFACE_LCM_PREFIX)
            || interface.starts_with(INTERFACE_COMPONENT_PREFIX)
    } else if provided {
        interface == INTERFACE_INTERNAL_PROVIDED
    } else {
        interface == INTERFACE_INTERNAL_REQUIRED
    }
}
