// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Introspection descriptors for provided interfaces.

use crate::command::{CommandKind, Prototype};
use crate::event::EventKind;
use serde::{Deserialize, Serialize};

/// Turns an argument/result prototype into an opaque descriptor string.
///
/// Only used by introspection; never on the execution path.
pub trait PrototypeSerializer {
    fn describe(&self, prototype: &Prototype) -> String;
}

/// Describes a prototype by its Rust type name.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeNameSerializer;

impl PrototypeSerializer for TypeNameSerializer {
    fn describe(&self, prototype: &Prototype) -> String {
        prototype.type_name().to_string()
    }
}

/// Describes a prototype by the `Debug` rendering of its example value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugSerializer;

impl PrototypeSerializer for DebugSerializer {
    fn describe(&self, prototype: &Prototype) -> String {
        format!("{:?}", prototype.value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescription {
    pub name: String,
    pub kind: CommandKind,
    pub queued: bool,
    pub argument: Option<String>,
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescription {
    pub name: String,
    pub kind: EventKind,
    pub argument: Option<String>,
}

/// Full description of a provided interface, as exchanged with remote
/// processes when a provided interface proxy is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescription {
    pub component: String,
    pub interface: String,
    pub commands: Vec<CommandDescription>,
    pub events: Vec<EventDescription>,
}

impl InterfaceDescription {
    pub fn command_names(&self, kind: CommandKind) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
