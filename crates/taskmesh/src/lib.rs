// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Taskmesh component middleware core
//!
//! Command dispatch between components running in their own threads, plus
//! the global registry that tracks processes, components, interfaces and
//! the connections between them.
//!
//! # Features
//!
//! - **Commands**: void, write, read, qualified read, write-return and
//!   void-return operations, executed directly or through a mailbox
//! - **Bindings**: each client of a provided interface gets its own mailbox,
//!   drained by the server component once per cycle
//! - **Events**: void and write events with ordered observer lists
//! - **Registry**: connection bookkeeping with asynchronous, idempotent
//!   disconnects handled by a background worker
//!
//! # Quick Start
//!
//! ```
//! use taskmesh::{Command, CommandKind, CommandQueueing, Component, InterfaceOptions,
//!                LocalManager, ManagerConfig, Registry};
//!
//! let registry = Registry::new(ManagerConfig::default()).unwrap();
//! let manager = LocalManager::new("P1", registry).unwrap();
//!
//! let server = Component::new("Robot");
//! let main = server.add_interface_provided("Main", InterfaceOptions::default()).unwrap();
//! main.add_command(Command::write("SetGain", |_: &f64| {}), CommandQueueing::Inherit)
//!     .unwrap();
//! let server = manager.add_component(server).unwrap();
//!
//! let client = Component::new("Controller");
//! client.add_interface_required("Robot").unwrap();
//! let client = manager.add_component(client).unwrap();
//!
//! manager.connect("Controller", "Robot", "Robot", "Main").unwrap();
//! let binding = client.required_binding("Robot").unwrap();
//! binding.call_write("SetGain", &0.5_f64).unwrap();
//!
//! // The server drains its mailboxes from its own cycle.
//! assert_eq!(server.process_mailboxes(), 1);
//! # let _ = CommandKind::Write;
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! mailbox_size = 64
//! argument_queue_size = 64
//! disconnect_grace_ms = 100
//! connect_confirm_timeout_secs = 0
//! timeout_check_interval_ms = 1000
//! ```

pub mod command;
pub mod component;
pub mod config;
pub mod description;
pub mod error;
pub mod event;
pub mod interface;
pub mod mailbox;
pub mod naming;
pub mod proxy;
pub mod registry;

pub use command::{
    Blocking, Command, CommandKind, CommandRef, Executed, Payload, Prototype, QueuedCommand,
};
pub use component::{Component, LocalManager};
pub use config::{ConfigError, ManagerConfig, DEFAULT_MAILBOX_SIZE};
pub use description::{
    CommandDescription, DebugSerializer, EventDescription, InterfaceDescription,
    PrototypeSerializer, TypeNameSerializer,
};
pub use error::{CommandError, InterfaceError, RegistryError};
pub use event::{Delivery, EventGenerator, EventKind};
pub use interface::{Binding, CommandQueueing, Interface, InterfaceOptions, InterfaceQueueing};
pub use mailbox::{Mailbox, QueuedHook};
pub use proxy::{NameQuery, NetworkProxy, ProxyError};
pub use registry::{
    ConnectionDescription, ConnectionId, ConnectionRecord, ConnectionState, ExecutionLayer,
    InterfaceRef, InterfaceRole, Registry, RegistryEvent, RegistrySnapshot,
};
