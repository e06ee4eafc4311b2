// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network proxy collaborator.
//!
//! One proxy stands for each connected remote process. The registry treats
//! every call as an opaque remote procedure: any [`ProxyError`] is mapped to
//! a client disconnect, which removes the remote process and everything it
//! owns from the registry.

use crate::description::InterfaceDescription;
use crate::registry::ConnectionDescription;
use thiserror::Error;

/// Transport failure reported by a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{call} failed: {reason}")]
pub struct ProxyError {
    pub call: &'static str,
    pub reason: String,
}

impl ProxyError {
    pub fn new(call: &'static str, reason: impl Into<String>) -> Self {
        Self {
            call,
            reason: reason.into(),
        }
    }
}

/// Which names a remote interface should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameQuery {
    Commands,
    Events,
    Functions,
    EventHandlers,
}

pub trait NetworkProxy: Send + Sync {
    /// Remote process this proxy talks to.
    fn process_name(&self) -> &str;

    fn create_component_proxy(&self, component_proxy: &str) -> Result<(), ProxyError>;

    fn create_provided_interface_proxy(
        &self,
        component_proxy: &str,
        description: &InterfaceDescription,
    ) -> Result<(), ProxyError>;

    fn create_required_interface_proxy(
        &self,
        component_proxy: &str,
        interface: &str,
    ) -> Result<(), ProxyError>;

    fn connect_server_side_interface(
        &self,
        connection: &ConnectionDescription,
    ) -> Result<(), ProxyError>;

    fn connect_client_side_interface(
        &self,
        connection: &ConnectionDescription,
    ) -> Result<(), ProxyError>;

    fn provided_interface_description(
        &self,
        component: &str,
        interface: &str,
    ) -> Result<InterfaceDescription, ProxyError>;

    /// Tears down the remote side of a cross-process connection.
    fn disconnect(&self, connection: &ConnectionDescription) -> Result<(), ProxyError>;

    fn interface_names(
        &self,
        component: &str,
        interface: &str,
        query: NameQuery,
    ) -> Result<Vec<String>, ProxyError>;
}
