// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for command dispatch, interfaces and the global registry.

use crate::command::CommandKind;
use crate::registry::ConnectionId;
use thiserror::Error;

/// Outcome of a failed command execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("mailbox \"{mailbox}\" is full")]
    MailboxFull { mailbox: String },

    #[error("argument queue of mailbox \"{mailbox}\" is full")]
    ArgumentQueueFull { mailbox: String },

    #[error("command \"{command}\" expects {expected}, got {found}")]
    InvalidArgument {
        command: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A queued command was executed without a mailbox, i.e. on the
    /// interface rather than on one of its bindings.
    #[error("command \"{command}\" is queued but not bound to a mailbox")]
    NotQueued { command: String },

    #[error("no {kind} command named \"{command}\"")]
    NotFound { command: String, kind: CommandKind },

    #[error("command \"{command}\" is a {kind} command")]
    WrongKind { command: String, kind: CommandKind },

    /// The binding owning the mailbox was removed.
    #[error("command \"{command}\" is disabled")]
    Disabled { command: String },
}

/// Errors raised while building or using provided interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterfaceError {
    #[error("empty {what} name in interface \"{interface}\"")]
    EmptyName {
        interface: String,
        what: &'static str,
    },

    #[error("interface \"{interface}\" already has a {what} named \"{name}\"")]
    Duplicate {
        interface: String,
        what: &'static str,
        name: String,
    },

    #[error("interface \"{interface}\" already has an event \"{name}\" of the other kind")]
    EventKindConflict { interface: String, name: String },

    #[error("event \"{name}\" not found in interface \"{interface}\"")]
    EventNotFound { interface: String, name: String },

    #[error("handler \"{handler}\" cannot observe event \"{event}\"")]
    HandlerMismatch { event: String, handler: String },

    #[error("handler \"{handler}\" is not registered for event \"{event}\"")]
    ObserverNotRegistered { event: String, handler: String },

    #[error("binding \"{binding}\" is not owned by interface \"{interface}\"")]
    WrongOwner { interface: String, binding: String },

    #[error("binding \"{binding}\" not found in interface \"{interface}\"")]
    BindingNotFound { interface: String, binding: String },

    #[error("interface owning binding \"{binding}\" no longer exists")]
    OwnerGone { binding: String },

    #[error("filtered write \"{name}\" needs a qualified read filter and a write command")]
    InvalidFilter { name: String },
}

/// Errors raised by the global component registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{what} \"{name}\" already exists")]
    AlreadyExists { what: &'static str, name: String },

    #[error("{what} \"{name}\" not found")]
    NotFound { what: &'static str, name: String },

    #[error("\"{client}\" is already connected to \"{server}\"")]
    AlreadyConnected { client: String, server: String },

    #[error("connection id space exhausted")]
    IdExhausted,

    #[error("unknown connection id {0}")]
    UnknownConnection(ConnectionId),

    #[error("network proxy for process \"{process}\" failed: {reason}")]
    Network { process: String, reason: String },

    #[error("failed to start disconnect worker: {0}")]
    Spawn(String),

    #[error("local connection failed: {0}")]
    Local(#[from] InterfaceError),
}

impl RegistryError {
    pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    pub(crate) fn exists(what: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            what,
            name: name.into(),
        }
    }
}
