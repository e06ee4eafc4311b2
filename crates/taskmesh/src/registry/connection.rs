// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection identifiers, records and registry notifications.

use crate::naming;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// Connection id. Ids are handed out in strictly increasing order and never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Sentinel for "no connection".
    pub const INVALID: ConnectionId = ConnectionId(u64::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

/// `process:component:interface` triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterfaceRef {
    pub process: String,
    pub component: String,
    pub interface: String,
}

impl InterfaceRef {
    pub fn new(process: &str, component: &str, interface: &str) -> Self {
        Self {
            process: process.to_string(),
            component: component.to_string(),
            interface: interface.to_string(),
        }
    }

    pub fn uid(&self) -> String {
        naming::interface_uid(&self.process, &self.component, &self.interface)
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.process, self.component, self.interface)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid interface id \"{0}\", expected process:component:interface")]
pub struct ParseInterfaceRefError(pub String);

impl FromStr for InterfaceRef {
    type Err = ParseInterfaceRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [process, component, interface]
                if !process.is_empty() && !component.is_empty() && !interface.is_empty() =>
            {
                Ok(Self::new(process, component, interface))
            }
            _ => Err(ParseInterfaceRefError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceRole {
    Provided,
    Required,
}

/// Client (required) and server (provided) ends of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub id: ConnectionId,
    pub client: InterfaceRef,
    pub server: InterfaceRef,
}

impl ConnectionDescription {
    /// Description without an id, resolved by name when disconnecting.
    pub fn by_name(client: InterfaceRef, server: InterfaceRef) -> Self {
        Self {
            id: ConnectionId::INVALID,
            client,
            server,
        }
    }

    pub fn is_local(&self) -> bool {
        self.client.process == self.server.process
    }
}

impl fmt::Display for ConnectionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.id, self.client, self.server)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Pending,
    Connected,
    DisconnectWaiting,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub description: ConnectionDescription,
    /// Process that asked for the connection.
    pub requester: String,
    /// `Pending` or `Connected`.
    pub state: ConnectionState,
    pub created: Instant,
}

impl ConnectionRecord {
    pub(crate) fn pending(description: ConnectionDescription, requester: &str) -> Self {
        Self {
            description,
            requester: requester.to_string(),
            state: ConnectionState::Pending,
            created: Instant::now(),
        }
    }
}

/// Notification published to registry subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    ProcessAdded(String),
    ProcessRemoved(String),
    ComponentAdded { process: String, component: String },
    ComponentRemoved { process: String, component: String },
    InterfaceAdded { interface: InterfaceRef, role: InterfaceRole },
    InterfaceRemoved { interface: InterfaceRef, role: InterfaceRole },
    Connected(ConnectionDescription),
    ConnectConfirmed(ConnectionId),
    Disconnected(ConnectionDescription),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interface_ref() {
        let parsed: InterfaceRef = "P1:C1:Main".parse().unwrap();
        assert_eq!(parsed, InterfaceRef::new("P1", "C1", "Main"));
        assert_eq!(parsed.to_string(), "P1:C1:Main");

        assert!("P1:C1".parse::<InterfaceRef>().is_err());
        assert!("P1::Main".parse::<InterfaceRef>().is_err());
        assert!("a:b:c:d".parse::<InterfaceRef>().is_err());
    }

    #[test]
    fn test_invalid_id_display() {
        assert_eq!(ConnectionId(3).to_string(), "3");
        assert_eq!(ConnectionId::INVALID.to_string(), "invalid");
        assert!(!ConnectionId::INVALID.is_valid());
    }
}
