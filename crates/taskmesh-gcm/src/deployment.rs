// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deployment description loaded at startup.
//!
//! ```toml
//! [[process]]
//! name = "P1"
//!
//! [[process.component]]
//! name = "Robot"
//! provided = ["Main"]
//!
//! [[connection]]
//! client = "P2:Controller:Robot"
//! server = "P1:Robot:Main"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use taskmesh::{ConnectionId, InterfaceRef, Registry, RegistryError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid deployment: {0}")]
    Invalid(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,

    #[serde(default)]
    pub provided: Vec<String>,

    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,

    #[serde(default, rename = "component")]
    pub components: Vec<ComponentSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Requesting process (default: the client's process)
    #[serde(default)]
    pub requester: Option<String>,

    /// `process:component:interface` of the required interface
    pub client: String,

    /// `process:component:interface` of the provided interface
    pub server: String,
}

impl ConnectionSpec {
    fn ends(&self) -> Result<(InterfaceRef, InterfaceRef), DeploymentError> {
        let parse = |s: &str| {
            s.parse::<InterfaceRef>()
                .map_err(|e| DeploymentError::Invalid(e.to_string()))
        };
        Ok((parse(&self.client)?, parse(&self.server)?))
    }
}

/// Processes, components and connections to register at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default, rename = "process")]
    pub processes: Vec<ProcessSpec>,

    #[serde(default, rename = "connection")]
    pub connections: Vec<ConnectionSpec>,
}

impl Deployment {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DeploymentError> {
        let content = std::fs::read_to_string(path)?;
        let deployment: Self = toml::from_str(&content)?;
        deployment.validate()?;
        Ok(deployment)
    }

    pub fn validate(&self) -> Result<(), DeploymentError> {
        let mut processes = BTreeSet::new();
        for process in &self.processes {
            if process.name.is_empty() {
                return Err(DeploymentError::Invalid("empty process name".into()));
            }
            if !processes.insert(process.name.as_str()) {
                return Err(DeploymentError::Invalid(format!(
                    "duplicate process \"{}\"",
                    process.name
                )));
            }
            let mut components = BTreeSet::new();
            for component in &process.components {
                if component.name.is_empty() || !components.insert(component.name.as_str()) {
                    return Err(DeploymentError::Invalid(format!(
                        "empty or duplicate component \"{}\" in process \"{}\"",
                        component.name, process.name
                    )));
                }
            }
        }
        for connection in &self.connections {
            connection.ends()?;
        }
        Ok(())
    }

    /// Registers everything in `registry` and confirms the connections.
    pub fn apply(&self, registry: &Registry) -> Result<Vec<ConnectionId>, DeploymentError> {
        for process in &self.processes {
            registry.add_process(&process.name)?;
            for component in &process.components {
                registry.add_component(&process.name, &component.name)?;
                for interface in &component.provided {
                    registry.add_interface_provided(&process.name, &component.name, interface)?;
                }
                for interface in &component.required {
                    registry.add_interface_required(&process.name, &component.name, interface)?;
                }
            }
        }

        let mut ids = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            let (client, server) = connection.ends()?;
            let requester = connection.requester.as_deref().unwrap_or(&client.process);
            let id = registry.connect(requester, &client, &server)?;
            registry.connect_confirm(id)?;
            ids.push(id);
        }
        info!(
            "Deployment applied: {} process(es), {} connection(s)",
            self.processes.len(),
            ids.len()
        );
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use taskmesh::ManagerConfig;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[[process]]
name = "P1"

[[process.component]]
name = "Robot"
provided = ["Main"]

[[process]]
name = "P2"

[[process.component]]
name = "Controller"
required = ["Robot"]

[[connection]]
client = "P2:Controller:Robot"
server = "P1:Robot:Main"
"#;

    #[test]
    fn test_load_and_apply() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();

        let deployment = Deployment::from_file(file.path()).unwrap();
        assert_eq!(deployment.processes.len(), 2);
        assert_eq!(deployment.processes[0].components[0].provided, vec!["Main"]);

        let registry = Registry::new(ManagerConfig::default()).unwrap();
        let ids = deployment.apply(&registry).unwrap();
        assert_eq!(ids.len(), 1);
        let listed = registry.list_connections();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].server.to_string(), "P1:Robot:Main");
        assert_eq!(registry.connection(ids[0]).unwrap().requester, "P2");
    }

    #[test]
    fn test_bad_interface_id_rejected() {
        let deployment: Deployment = toml::from_str(
            r#"
[[connection]]
client = "P2:Controller"
server = "P1:Robot:Main"
"#,
        )
        .unwrap();
        assert!(matches!(deployment.validate(), Err(DeploymentError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_process_rejected() {
        let deployment = Deployment {
            processes: vec![
                ProcessSpec {
                    name: "P1".into(),
                    ..ProcessSpec::default()
                },
                ProcessSpec {
                    name: "P1".into(),
                    ..ProcessSpec::default()
                },
            ],
            connections: Vec::new(),
        };
        assert!(deployment.validate().is_err());
    }

    #[test]
    fn test_apply_reports_registry_errors() {
        let deployment: Deployment = toml::from_str(
            r#"
[[process]]
name = "P1"

[[connection]]
client = "P1:A:In"
server = "P1:B:Out"
"#,
        )
        .unwrap();
        let registry = Registry::new(ManagerConfig::default()).unwrap();
        assert!(matches!(
            deployment.apply(&registry),
            Err(DeploymentError::Registry(RegistryError::NotFound { .. }))
        ));
    }
}
