// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Point-in-time view of the registry for monitoring and debugging.

use super::{ConnectionId, ConnectionState, InterfaceRole, Registry};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceSnapshot {
    pub name: String,
    pub connections: Vec<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSnapshot {
    pub name: String,
    pub provided: Vec<InterfaceSnapshot>,
    pub required: Vec<InterfaceSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSnapshot {
    pub name: String,
    pub components: Vec<ComponentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub client: String,
    pub server: String,
    pub requester: String,
    pub state: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub processes: Vec<ProcessSnapshot>,
    pub connections: Vec<ConnectionSnapshot>,
    pub disconnect_waiting: Vec<ConnectionId>,
    pub disconnected: Vec<ConnectionId>,
}

impl Registry {
    /// Copies the registry state. Each map is locked on its own, so the
    /// parts may be from slightly different instants.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let interfaces = |map: &std::collections::BTreeMap<String, Vec<ConnectionId>>| {
            map.iter()
                .map(|(name, ids)| InterfaceSnapshot {
                    name: name.clone(),
                    connections: ids.clone(),
                })
                .collect::<Vec<_>>()
        };

        let processes = self
            .shared
            .processes
            .read()
            .iter()
            .map(|(process, components)| ProcessSnapshot {
                name: process.clone(),
                components: components
                    .iter()
                    .map(|(component, lists)| ComponentSnapshot {
                        name: component.clone(),
                        provided: interfaces(lists.get(InterfaceRole::Provided)),
                        required: interfaces(lists.get(InterfaceRole::Required)),
                    })
                    .collect(),
            })
            .collect();

        let connections = self
            .shared
            .connections
            .read()
            .values()
            .map(|record| ConnectionSnapshot {
                id: record.description.id,
                client: record.description.client.to_string(),
                server: record.description.server.to_string(),
                requester: record.requester.clone(),
                state: record.state,
            })
            .collect();

        let disconnect_waiting = self.shared.waiting.lock().iter().copied().collect();
        let disconnected = self.shared.disconnected.lock().iter().copied().collect();

        RegistrySnapshot {
            processes,
            connections,
            disconnect_waiting,
            disconnected,
        }
    }

    /// Human-readable listing of [`Registry::snapshot`].
    pub fn dump(&self) -> String {
        self.snapshot().to_string()
    }
}

fn ids_list(ids: &[ConnectionId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for process in &self.processes {
            writeln!(f, "|P| {}", process.name)?;
            for component in &process.components {
                writeln!(f, "  |C| {}", component.name)?;
                for interface in &component.provided {
                    let ids = ids_list(&interface.connections);
                    writeln!(f, "    |IP| {} [{}]", interface.name, ids)?;
                }
                for interface in &component.required {
                    let ids = ids_list(&interface.connections);
                    writeln!(f, "    |IR| {} [{}]", interface.name, ids)?;
                }
            }
        }
        writeln!(f, "Connections:")?;
        for c in &self.connections {
            writeln!(
                f,
                "  [{}] {} - {} (requested by {}, {:?})",
                c.id, c.client, c.server, c.requester, c.state
            )?;
        }
        writeln!(f, "Disconnect waiting: [{}]", ids_list(&self.disconnect_waiting))?;
        write!(f, "Disconnected: [{}]", ids_list(&self.disconnected))
    }
}
