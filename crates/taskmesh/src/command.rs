// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Commands and their queued variants.
//!
//! A [`Command`] is an immutable operation descriptor: a name, a kind, the
//! argument/result prototypes and the callable target. Interfaces hand out
//! [`CommandRef`]s, which either execute the command in the caller's thread
//! ([`CommandRef::Direct`]) or enqueue it into the mailbox of the binding the
//! caller was given ([`CommandRef::Queued`]).
//!
//! # Example
//!
//! ```
//! use taskmesh::{Blocking, Command, CommandRef};
//! use std::sync::Arc;
//!
//! let command = CommandRef::Direct(Arc::new(Command::read("GetPosition", || 42.0_f64)));
//! let value = command.execute_read().unwrap();
//! assert_eq!(value.downcast_ref::<f64>(), Some(&42.0));
//! # let _ = Blocking::No;
//! ```

use crate::error::CommandError;
use crate::mailbox::{Completion, Invocation, Mailbox};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Payloads and prototypes
// ============================================================================

/// Value carried as a command argument or result.
///
/// Implemented for every `Clone + Debug + Send + Sync + 'static` type, so
/// plain Rust values can be passed as `&dyn Payload`.
pub trait Payload: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Deep copy used when an argument is stored in a mailbox.
    fn clone_payload(&self) -> Box<dyn Payload>;

    fn type_name(&self) -> &'static str;
}

impl<T> Payload for T
where
    T: Any + Clone + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn Payload {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Type descriptor of an argument or result, with an example value used for
/// introspection.
#[derive(Clone)]
pub struct Prototype {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Payload>,
}

impl Prototype {
    /// Prototype built from the type's default value.
    pub fn of<T: Payload + Default>() -> Self {
        Self::from_value(T::default())
    }

    pub fn from_value<T: Payload>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn value(&self) -> &dyn Payload {
        self.value.as_ref()
    }

    /// True when `value` has exactly the prototype's type.
    pub fn accepts(&self, value: &dyn Payload) -> bool {
        value.as_any().type_id() == self.type_id
    }

    pub fn same_type(&self, other: &Prototype) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prototype<{}>", self.type_name)
    }
}

// ============================================================================
// Command kinds and targets
// ============================================================================

/// Kind tag of a command. Names are unique within one kind table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Void,
    Read,
    Write,
    QualifiedRead,
    WriteReturn,
    VoidReturn,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::Void,
        CommandKind::Read,
        CommandKind::Write,
        CommandKind::QualifiedRead,
        CommandKind::WriteReturn,
        CommandKind::VoidReturn,
    ];

    pub fn takes_argument(self) -> bool {
        matches!(
            self,
            CommandKind::Write | CommandKind::QualifiedRead | CommandKind::WriteReturn
        )
    }

    /// Result-carrying commands always wait for completion when queued.
    pub fn returns_result(self) -> bool {
        matches!(
            self,
            CommandKind::Read
                | CommandKind::QualifiedRead
                | CommandKind::WriteReturn
                | CommandKind::VoidReturn
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Void => "void",
            CommandKind::Read => "read",
            CommandKind::Write => "write",
            CommandKind::QualifiedRead => "qualified read",
            CommandKind::WriteReturn => "write return",
            CommandKind::VoidReturn => "void return",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type VoidMethod = Arc<dyn Fn() + Send + Sync>;
pub type WriteMethod = Arc<dyn Fn(&dyn Payload) + Send + Sync>;
pub type ReadMethod = Arc<dyn Fn() -> Box<dyn Payload> + Send + Sync>;
pub type QualifiedMethod = Arc<dyn Fn(&dyn Payload) -> Box<dyn Payload> + Send + Sync>;

#[derive(Clone)]
enum Target {
    Void(VoidMethod),
    Read(ReadMethod),
    Write(WriteMethod),
    QualifiedRead(QualifiedMethod),
    WriteReturn(QualifiedMethod),
    VoidReturn(ReadMethod),
    /// Qualified read applied to the argument before the write runs.
    FilteredWrite {
        filter: Arc<Command>,
        write: Arc<Command>,
    },
}

// ============================================================================
// Command
// ============================================================================

/// Immutable operation descriptor.
pub struct Command {
    name: String,
    kind: CommandKind,
    argument: Option<Prototype>,
    result: Option<Prototype>,
    target: Target,
}

impl Command {
    pub fn void<F>(name: impl Into<String>, method: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: CommandKind::Void,
            argument: None,
            result: None,
            target: Target::Void(Arc::new(method)),
        }
    }

    pub fn write<T, F>(name: impl Into<String>, method: F) -> Self
    where
        T: Payload + Default,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let target = Target::Write(Arc::new(move |argument: &dyn Payload| {
            if let Some(value) = argument.downcast_ref::<T>() {
                method(value);
            }
        }));
        Self {
            name: name.into(),
            kind: CommandKind::Write,
            argument: Some(Prototype::of::<T>()),
            result: None,
            target,
        }
    }

    pub fn read<R, F>(name: impl Into<String>, method: F) -> Self
    where
        R: Payload + Default,
        F: Fn() -> R + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: CommandKind::Read,
            argument: None,
            result: Some(Prototype::of::<R>()),
            target: Target::Read(Arc::new(move || Box::new(method()) as Box<dyn Payload>)),
        }
    }

    pub fn qualified_read<A, R, F>(name: impl Into<String>, method: F) -> Self
    where
        A: Payload + Default,
        R: Payload + Default,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: CommandKind::QualifiedRead,
            argument: Some(Prototype::of::<A>()),
            result: Some(Prototype::of::<R>()),
            target: Target::QualifiedRead(qualified::<A, R, F>(method)),
        }
    }

    pub fn write_return<A, R, F>(name: impl Into<String>, method: F) -> Self
    where
        A: Payload + Default,
        R: Payload + Default,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: CommandKind::WriteReturn,
            argument: Some(Prototype::of::<A>()),
            result: Some(Prototype::of::<R>()),
            target: Target::WriteReturn(qualified::<A, R, F>(method)),
        }
    }

    pub fn void_return<R, F>(name: impl Into<String>, method: F) -> Self
    where
        R: Payload + Default,
        F: Fn() -> R + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: CommandKind::VoidReturn,
            argument: None,
            result: Some(Prototype::of::<R>()),
            target: Target::VoidReturn(Arc::new(move || Box::new(method()) as Box<dyn Payload>)),
        }
    }

    /// Write command whose argument first goes through `filter`.
    pub(crate) fn filtered_write(filter: Arc<Command>, write: Arc<Command>) -> Self {
        Self {
            name: write.name.clone(),
            kind: CommandKind::Write,
            argument: filter.argument.clone(),
            result: None,
            target: Target::FilteredWrite { filter, write },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn argument(&self) -> Option<&Prototype> {
        self.argument.as_ref()
    }

    pub fn result(&self) -> Option<&Prototype> {
        self.result.as_ref()
    }

    pub(crate) fn check_argument(
        &self,
        argument: Option<&dyn Payload>,
    ) -> Result<(), CommandError> {
        let mismatch = |expected: &'static str, found: &'static str| {
            CommandError::InvalidArgument {
                command: self.name.clone(),
                expected,
                found,
            }
        };
        match (&self.argument, argument) {
            (Some(prototype), Some(value)) if prototype.accepts(value) => Ok(()),
            (Some(prototype), Some(value)) => {
                Err(mismatch(prototype.type_name(), value.type_name()))
            }
            (Some(prototype), None) => Err(mismatch(prototype.type_name(), "no argument")),
            (None, Some(value)) => Err(mismatch("no argument", value.type_name())),
            (None, None) => Ok(()),
        }
    }

    /// Runs the target in the calling thread.
    pub(crate) fn invoke(
        &self,
        argument: Option<&dyn Payload>,
    ) -> Result<Option<Box<dyn Payload>>, CommandError> {
        self.check_argument(argument)?;
        match &self.target {
            Target::Void(method) => {
                method();
                Ok(None)
            }
            Target::Write(method) => {
                if let Some(value) = argument {
                    method(value);
                }
                Ok(None)
            }
            Target::Read(method) | Target::VoidReturn(method) => Ok(Some(method())),
            Target::QualifiedRead(method) | Target::WriteReturn(method) => {
                Ok(argument.map(|value| method(value)))
            }
            Target::FilteredWrite { filter, write } => {
                let filtered = filter.invoke(argument)?;
                write.invoke(filtered.as_deref())
            }
        }
    }

    fn filter_stage(&self) -> Option<(&Arc<Command>, &Arc<Command>)> {
        match &self.target {
            Target::FilteredWrite { filter, write } => Some((filter, write)),
            _ => None,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("argument", &self.argument)
            .field("result", &self.result)
            .finish()
    }
}

fn qualified<A, R, F>(method: F) -> QualifiedMethod
where
    A: Payload + Default,
    R: Payload + Default,
    F: Fn(&A) -> R + Send + Sync + 'static,
{
    Arc::new(move |argument: &dyn Payload| match argument.downcast_ref::<A>() {
        Some(value) => Box::new(method(value)) as Box<dyn Payload>,
        None => Box::new(R::default()) as Box<dyn Payload>,
    })
}

// ============================================================================
// Execution
// ============================================================================

/// Whether a queued void/write call waits for the owning thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blocking {
    #[default]
    No,
    Yes,
}

/// Successful execution outcome.
#[derive(Debug)]
pub enum Executed {
    /// Ran to completion, with the result for result-carrying kinds.
    Done(Option<Box<dyn Payload>>),
    /// Accepted by the mailbox; runs during the owner's next cycle.
    Queued,
}

/// Queued decorator: the shared command plus the mailbox it enqueues into.
#[derive(Clone)]
pub struct QueuedCommand {
    command: Arc<Command>,
    mailbox: Option<Arc<Mailbox>>,
}

impl QueuedCommand {
    /// Prototype stored in an interface table, not yet bound to a mailbox.
    pub(crate) fn unbound(command: Arc<Command>) -> Self {
        Self {
            command,
            mailbox: None,
        }
    }

    /// Clone sharing the callable, bound to `mailbox`.
    pub(crate) fn bind(&self, mailbox: &Arc<Mailbox>) -> Self {
        Self {
            command: Arc::clone(&self.command),
            mailbox: Some(Arc::clone(mailbox)),
        }
    }

    pub fn mailbox(&self) -> Option<&Arc<Mailbox>> {
        self.mailbox.as_ref()
    }

    fn execute(
        &self,
        argument: Option<&dyn Payload>,
        blocking: Blocking,
    ) -> Result<Executed, CommandError> {
        self.command.check_argument(argument)?;
        let Some(mailbox) = &self.mailbox else {
            return Err(CommandError::NotQueued {
                command: self.command.name().to_string(),
            });
        };

        // Filters run in the caller's thread; only the write is queued.
        let (command, argument) = match self.command.filter_stage() {
            Some((filter, write)) => (Arc::clone(write), filter.invoke(argument)?),
            None => (
                Arc::clone(&self.command),
                argument.map(|value| value.clone_payload()),
            ),
        };

        let wait = blocking == Blocking::Yes || command.kind().returns_result();
        let completion = wait.then(|| Arc::new(Completion::new()));
        mailbox.push(Invocation {
            command,
            argument,
            completion: completion.clone(),
        })?;

        match completion {
            Some(completion) => completion.wait().map(Executed::Done),
            None => Ok(Executed::Queued),
        }
    }
}

/// Command as handed out by an interface or a binding.
#[derive(Clone)]
pub enum CommandRef {
    Direct(Arc<Command>),
    Queued(QueuedCommand),
}

impl CommandRef {
    pub fn command(&self) -> &Arc<Command> {
        match self {
            CommandRef::Direct(command) => command,
            CommandRef::Queued(queued) => &queued.command,
        }
    }

    pub fn name(&self) -> &str {
        self.command().name()
    }

    pub fn kind(&self) -> CommandKind {
        self.command().kind()
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, CommandRef::Queued(_))
    }

    /// Executes with the generic contract shared by every kind.
    pub fn execute(
        &self,
        argument: Option<&dyn Payload>,
        blocking: Blocking,
    ) -> Result<Executed, CommandError> {
        match self {
            CommandRef::Direct(command) => command.invoke(argument).map(Executed::Done),
            CommandRef::Queued(queued) => queued.execute(argument, blocking),
        }
    }

    pub fn execute_void(&self, blocking: Blocking) -> Result<Executed, CommandError> {
        self.expect_kind(CommandKind::Void)?;
        self.execute(None, blocking)
    }

    pub fn execute_write(
        &self,
        argument: &dyn Payload,
        blocking: Blocking,
    ) -> Result<Executed, CommandError> {
        self.expect_kind(CommandKind::Write)?;
        self.execute(Some(argument), blocking)
    }

    pub fn execute_read(&self) -> Result<Box<dyn Payload>, CommandError> {
        self.expect_kind(CommandKind::Read)?;
        self.returned(self.execute(None, Blocking::Yes)?)
    }

    pub fn execute_qualified_read(
        &self,
        argument: &dyn Payload,
    ) -> Result<Box<dyn Payload>, CommandError> {
        self.expect_kind(CommandKind::QualifiedRead)?;
        self.returned(self.execute(Some(argument), Blocking::Yes)?)
    }

    pub fn execute_write_return(
        &self,
        argument: &dyn Payload,
    ) -> Result<Box<dyn Payload>, CommandError> {
        self.expect_kind(CommandKind::WriteReturn)?;
        self.returned(self.execute(Some(argument), Blocking::Yes)?)
    }

    pub fn execute_void_return(&self) -> Result<Box<dyn Payload>, CommandError> {
        self.expect_kind(CommandKind::VoidReturn)?;
        self.returned(self.execute(None, Blocking::Yes)?)
    }

    /// Same callable and same mailbox.
    pub fn same_target(&self, other: &CommandRef) -> bool {
        match (self, other) {
            (CommandRef::Direct(a), CommandRef::Direct(b)) => Arc::ptr_eq(a, b),
            (CommandRef::Queued(a), CommandRef::Queued(b)) => {
                Arc::ptr_eq(&a.command, &b.command)
                    && match (&a.mailbox, &b.mailbox) {
                        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    pub(crate) fn bind(&self, mailbox: &Arc<Mailbox>) -> CommandRef {
        match self {
            CommandRef::Direct(_) => self.clone(),
            CommandRef::Queued(queued) => CommandRef::Queued(queued.bind(mailbox)),
        }
    }

    fn expect_kind(&self, kind: CommandKind) -> Result<(), CommandError> {
        if self.kind() == kind {
            Ok(())
        } else {
            Err(CommandError::WrongKind {
                command: self.name().to_string(),
                kind: self.kind(),
            })
        }
    }

    fn returned(&self, executed: Executed) -> Result<Box<dyn Payload>, CommandError> {
        match executed {
            Executed::Done(Some(value)) => Ok(value),
            _ => Err(CommandError::WrongKind {
                command: self.name().to_string(),
                kind: self.kind(),
            }),
        }
    }
}

impl fmt::Debug for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandRef::Direct(command) => write!(f, "Direct({})", command.name()),
            CommandRef::Queued(queued) => write!(
                f,
                "Queued({}, {})",
                queued.command.name(),
                queued
                    .mailbox
                    .as_ref()
                    .map_or("unbound", |mailbox| mailbox.name())
            ),
        }
    }
}
