// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provided interfaces and their per-client bindings.
//!
//! An [`Interface`] owns the canonical command and event tables of a provided
//! interface. Each client connecting to it receives a [`Binding`]: a view of
//! the same commands where every queued command is re-bound to a mailbox
//! owned by that binding alone. The interface keeps its live bindings in an
//! arena keyed by a monotonically increasing counter and drains all of their
//! mailboxes once per cycle of the owning component.
//!
//! # Queueing policy
//!
//! | interface \ request | Inherit | ForceQueued         | ForceDirect            |
//! |---------------------|---------|---------------------|------------------------|
//! | Queued              | queued  | queued (redundant)  | direct (warning)       |
//! | Direct              | direct  | direct (error)      | direct (redundant)     |

use crate::command::{
    Blocking, Command, CommandKind, CommandRef, Executed, Payload, Prototype, QueuedCommand,
};
use crate::config::{ManagerConfig, DEFAULT_MAILBOX_SIZE};
use crate::description::{
    CommandDescription, EventDescription, InterfaceDescription, PrototypeSerializer,
};
use crate::error::{CommandError, InterfaceError};
use crate::event::{Delivery, EventGenerator, EventKind};
use crate::mailbox::{CompletionEvents, Mailbox, QueuedHook};
use crate::naming;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Void event fired on a binding when a blocking void/write call completes.
pub const BLOCKING_COMMAND_EXECUTED: &str = "BlockingCommandExecuted";
/// Write event (command name) fired when a result-carrying call completes.
pub const BLOCKING_COMMAND_RETURN_EXECUTED: &str = "BlockingCommandReturnExecuted";

pub const EVENT_STATUS: &str = "status";
pub const EVENT_WARNING: &str = "warning";
pub const EVENT_ERROR: &str = "error";

static NEXT_INTERFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Interface-level queueing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterfaceQueueing {
    #[default]
    Queued,
    Direct,
}

/// Queueing requested when adding a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandQueueing {
    #[default]
    Inherit,
    ForceQueued,
    ForceDirect,
}

/// Construction options for an [`Interface`].
#[derive(Clone)]
pub struct InterfaceOptions {
    pub queueing: InterfaceQueueing,
    /// Network proxy interfaces get no completion events on their bindings.
    pub proxy: bool,
    pub mailbox_size: usize,
    pub argument_queue_size: usize,
    pub on_queued: Option<QueuedHook>,
}

impl Default for InterfaceOptions {
    fn default() -> Self {
        Self {
            queueing: InterfaceQueueing::Queued,
            proxy: false,
            mailbox_size: DEFAULT_MAILBOX_SIZE,
            argument_queue_size: DEFAULT_MAILBOX_SIZE,
            on_queued: None,
        }
    }
}

impl InterfaceOptions {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            mailbox_size: config.mailbox_size,
            argument_queue_size: config.argument_queue_size,
            ..Self::default()
        }
    }

    pub fn direct() -> Self {
        Self {
            queueing: InterfaceQueueing::Direct,
            ..Self::default()
        }
    }

    pub fn proxy(mut self) -> Self {
        self.proxy = true;
        self
    }

    pub fn with_hook(mut self, hook: QueuedHook) -> Self {
        self.on_queued = Some(hook);
        self
    }
}

type KindTable = BTreeMap<CommandKind, BTreeMap<String, CommandRef>>;

#[derive(Default)]
struct CommandTable {
    by_kind: KindTable,
    /// Filters and the writes behind filtered writes.
    internal: BTreeMap<String, Arc<Command>>,
}

#[derive(Default)]
struct EventTable {
    void: BTreeMap<String, Arc<EventGenerator>>,
    write: BTreeMap<String, Arc<EventGenerator>>,
}

impl EventTable {
    fn get(&self, name: &str) -> Option<&Arc<EventGenerator>> {
        self.void.get(name).or_else(|| self.write.get(name))
    }

    fn names(&self) -> Vec<String> {
        self.void.keys().chain(self.write.keys()).cloned().collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct MailboxSizes {
    mailbox: usize,
    arguments: usize,
}

struct InterfaceShared {
    id: u64,
    component: String,
    name: String,
    queueing: InterfaceQueueing,
    proxy: bool,
    sizes: Mutex<MailboxSizes>,
    on_queued: Option<QueuedHook>,
    commands: RwLock<CommandTable>,
    events: RwLock<EventTable>,
    bindings: Mutex<BTreeMap<u64, Binding>>,
    next_binding: AtomicU64,
}

// ============================================================================
// Interface
// ============================================================================

/// Canonical provided interface.
#[derive(Clone)]
pub struct Interface {
    shared: Arc<InterfaceShared>,
}

impl Interface {
    pub fn new(
        component: impl Into<String>,
        name: impl Into<String>,
        options: InterfaceOptions,
    ) -> Self {
        Self {
            shared: Arc::new(InterfaceShared {
                id: NEXT_INTERFACE_ID.fetch_add(1, Ordering::Relaxed),
                component: component.into(),
                name: name.into(),
                queueing: options.queueing,
                proxy: options.proxy,
                sizes: Mutex::new(MailboxSizes {
                    mailbox: options.mailbox_size.max(1),
                    arguments: options.argument_queue_size.max(1),
                }),
                on_queued: options.on_queued,
                commands: RwLock::new(CommandTable::default()),
                events: RwLock::new(EventTable::default()),
                bindings: Mutex::new(BTreeMap::new()),
                next_binding: AtomicU64::new(1),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn component_name(&self) -> &str {
        &self.shared.component
    }

    /// `component:interface`
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.shared.component, self.shared.name)
    }

    pub fn queueing(&self) -> InterfaceQueueing {
        self.shared.queueing
    }

    pub fn is_proxy(&self) -> bool {
        self.shared.proxy
    }

    pub fn is_same(&self, other: &Interface) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ------------------------------------------------------------------
    // Mailbox sizing (applies to bindings created afterwards)
    // ------------------------------------------------------------------

    pub fn mailbox_size(&self) -> usize {
        self.shared.sizes.lock().mailbox
    }

    pub fn argument_queue_size(&self) -> usize {
        self.shared.sizes.lock().arguments
    }

    pub fn set_mailbox_size(&self, size: usize) {
        if self.shared.queueing == InterfaceQueueing::Direct {
            warn!(
                "set_mailbox_size: interface \"{}\" does not queue commands, size has no effect",
                self.full_name()
            );
        }
        self.shared.sizes.lock().mailbox = size.max(1);
    }

    pub fn set_argument_queue_size(&self, size: usize) {
        if self.shared.queueing == InterfaceQueueing::Direct {
            warn!(
                "set_argument_queue_size: \"{}\" does not queue, size has no effect",
                self.full_name()
            );
        }
        let mut sizes = self.shared.sizes.lock();
        if size > sizes.mailbox {
            warn!(
                "set_argument_queue_size: \"{}\" size {} exceeds mailbox size {}, extra unused",
                self.full_name(),
                size,
                sizes.mailbox
            );
        }
        sizes.arguments = size.max(1);
    }

    pub fn set_mailbox_and_argument_queue_sizes(&self, size: usize) {
        self.set_mailbox_size(size);
        self.set_argument_queue_size(size);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn use_queue(&self, requested: CommandQueueing, method: &str, name: &str) -> bool {
        let interface = self.full_name();
        match (self.shared.queueing, requested) {
            (InterfaceQueueing::Queued, CommandQueueing::Inherit) => true,
            (InterfaceQueueing::Direct, CommandQueueing::Inherit) => false,
            (InterfaceQueueing::Queued, CommandQueueing::ForceQueued) => {
                debug!("{method}: \"{name}\" on \"{interface}\": interface already queues");
                true
            }
            (InterfaceQueueing::Direct, CommandQueueing::ForceDirect) => {
                debug!("{method}: \"{name}\" on \"{interface}\": interface is already direct");
                false
            }
            (InterfaceQueueing::Queued, CommandQueueing::ForceDirect) => {
                warn!(
                    "{method}: \"{name}\" on \"{interface}\" is not queued, \
                     thread safety is up to the method"
                );
                false
            }
            (InterfaceQueueing::Direct, CommandQueueing::ForceQueued) => {
                error!(
                    "{method}: \"{name}\" on \"{interface}\" requests queueing but the \
                     interface does not queue, adding it as a direct command"
                );
                false
            }
        }
    }

    fn check_name(&self, name: &str, what: &'static str) -> Result<(), InterfaceError> {
        if name.is_empty() {
            error!("interface \"{}\": empty {} name", self.full_name(), what);
            return Err(InterfaceError::EmptyName {
                interface: self.full_name(),
                what,
            });
        }
        Ok(())
    }

    fn duplicate(&self, what: &'static str, name: &str) -> InterfaceError {
        error!("interface \"{}\": {} \"{}\" already exists", self.full_name(), what, name);
        InterfaceError::Duplicate {
            interface: self.full_name(),
            what,
            name: name.to_string(),
        }
    }

    /// Registers `command` in the table of its kind.
    pub fn add_command(
        &self,
        command: Command,
        queueing: CommandQueueing,
    ) -> Result<CommandRef, InterfaceError> {
        self.check_name(command.name(), command.kind().as_str())?;
        let queued = self.use_queue(queueing, "add_command", command.name());
        let kind = command.kind();
        let name = command.name().to_string();
        let command = Arc::new(command);
        let entry = if queued {
            CommandRef::Queued(QueuedCommand::unbound(command))
        } else {
            CommandRef::Direct(command)
        };

        let mut commands = self.shared.commands.write();
        let table = commands.by_kind.entry(kind).or_default();
        if table.contains_key(&name) {
            return Err(self.duplicate(kind.as_str(), &name));
        }
        table.insert(name.clone(), entry.clone());
        debug!(
            "interface \"{}\": added {} command \"{}\" ({})",
            self.full_name(),
            kind,
            name,
            if queued { "queued" } else { "direct" }
        );
        Ok(entry)
    }

    /// Adds a write command whose argument first goes through `filter`.
    ///
    /// The filter is stored internally under its own name and the write
    /// under `<write name>Write`. The filter always runs in the caller's
    /// thread; the write is queued or direct per policy.
    pub fn add_command_filtered_write(
        &self,
        filter: Command,
        write: Command,
        queueing: CommandQueueing,
    ) -> Result<CommandRef, InterfaceError> {
        if filter.kind() != CommandKind::QualifiedRead || write.kind() != CommandKind::Write {
            error!(
                "add_command_filtered_write: \"{}\" needs a qualified read filter and a write",
                write.name()
            );
            return Err(InterfaceError::InvalidFilter {
                name: write.name().to_string(),
            });
        }
        let compatible = match (filter.result(), write.argument()) {
            (Some(output), Some(input)) => output.same_type(input),
            _ => false,
        };
        if !compatible {
            error!(
                "add_command_filtered_write: filter \"{}\" output does not match \"{}\"",
                filter.name(),
                write.name()
            );
            return Err(InterfaceError::InvalidFilter {
                name: write.name().to_string(),
            });
        }
        self.check_name(write.name(), "write")?;
        let queued = self.use_queue(queueing, "add_command_filtered_write", write.name());

        let filter = Arc::new(filter);
        let write = Arc::new(write);
        let filter_key = filter.name().to_string();
        let write_key = format!("{}Write", write.name());
        let name = write.name().to_string();

        let mut commands = self.shared.commands.write();
        if commands.internal.contains_key(&filter_key) {
            return Err(self.duplicate("internal command", &filter_key));
        }
        commands.internal.insert(filter_key.clone(), Arc::clone(&filter));
        if commands.internal.contains_key(&write_key) {
            commands.internal.remove(&filter_key);
            return Err(self.duplicate("internal command", &write_key));
        }
        commands.internal.insert(write_key.clone(), Arc::clone(&write));

        let filtered = Arc::new(Command::filtered_write(filter, write));
        let entry = if queued {
            CommandRef::Queued(QueuedCommand::unbound(filtered))
        } else {
            CommandRef::Direct(filtered)
        };
        let table = commands.by_kind.entry(CommandKind::Write).or_default();
        if table.contains_key(&name) {
            commands.internal.remove(&filter_key);
            commands.internal.remove(&write_key);
            return Err(self.duplicate("write", &name));
        }
        table.insert(name, entry.clone());
        Ok(entry)
    }

    pub fn command(&self, kind: CommandKind, name: &str) -> Option<CommandRef> {
        self.shared.commands.read().by_kind.get(&kind)?.get(name).cloned()
    }

    pub fn names_of_commands(&self, kind: CommandKind) -> Vec<String> {
        self.shared
            .commands
            .read()
            .by_kind
            .get(&kind)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn names_of_internal_commands(&self) -> Vec<String> {
        self.shared.commands.read().internal.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_void(&self, name: &str) -> Result<Arc<EventGenerator>, InterfaceError> {
        self.check_name(name, "event")?;
        let mut events = self.shared.events.write();
        if events.write.contains_key(name) {
            return Err(self.event_conflict(name));
        }
        if events.void.contains_key(name) {
            return Err(self.duplicate("void event", name));
        }
        let event = Arc::new(EventGenerator::void(name));
        events.void.insert(name.to_string(), Arc::clone(&event));
        Ok(event)
    }

    pub fn add_event_write(
        &self,
        name: &str,
        argument: Prototype,
    ) -> Result<Arc<EventGenerator>, InterfaceError> {
        self.check_name(name, "event")?;
        let mut events = self.shared.events.write();
        if events.void.contains_key(name) {
            return Err(self.event_conflict(name));
        }
        if events.write.contains_key(name) {
            return Err(self.duplicate("write event", name));
        }
        let event = Arc::new(EventGenerator::write(name, argument));
        events.write.insert(name.to_string(), Arc::clone(&event));
        Ok(event)
    }

    fn event_conflict(&self, name: &str) -> InterfaceError {
        error!(
            "interface \"{}\": event \"{}\" already exists with the other kind",
            self.full_name(),
            name
        );
        InterfaceError::EventKindConflict {
            interface: self.full_name(),
            name: name.to_string(),
        }
    }

    /// Adds the `status`, `warning` and `error` text events.
    pub fn add_message_events(&self) -> Result<(), InterfaceError> {
        for name in [EVENT_STATUS, EVENT_WARNING, EVENT_ERROR] {
            self.add_event_write(name, Prototype::of::<String>())?;
        }
        Ok(())
    }

    /// Sends `text` through one of the message events, if present.
    pub fn send_message(&self, event: &str, text: &str) -> Option<Delivery> {
        let generator = self.shared.events.read().write.get(event).cloned()?;
        Some(generator.trigger_with(&text.to_string()))
    }

    pub fn event(&self, name: &str) -> Option<Arc<EventGenerator>> {
        self.shared.events.read().get(name).cloned()
    }

    pub fn names_of_events(&self, kind: EventKind) -> Vec<String> {
        let events = self.shared.events.read();
        match kind {
            EventKind::Void => events.void.keys().cloned().collect(),
            EventKind::Write => events.write.keys().cloned().collect(),
        }
    }

    /// Registers `handler` on event `name`. Failures are logged only when
    /// `required` is set.
    pub fn add_observer(
        &self,
        name: &str,
        handler: CommandRef,
        required: bool,
    ) -> Result<(), InterfaceError> {
        let Some(event) = self.event(name) else {
            if required {
                error!(
                    "add_observer: no event \"{}\" in interface \"{}\", available events: {:?}",
                    name,
                    self.full_name(),
                    self.shared.events.read().names()
                );
            }
            return Err(InterfaceError::EventNotFound {
                interface: self.full_name(),
                name: name.to_string(),
            });
        };
        observe(&event, handler, required)
    }

    pub fn remove_observer(&self, name: &str, handler: &CommandRef) -> Result<(), InterfaceError> {
        let event = self.event(name).ok_or_else(|| InterfaceError::EventNotFound {
            interface: self.full_name(),
            name: name.to_string(),
        })?;
        event.remove_observer(handler).inspect_err(|e| warn!("remove_observer: {e}"))
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    /// Creates the binding handed to client `user`.
    pub fn create_binding(&self, user: &str) -> Binding {
        let key = self.shared.next_binding.fetch_add(1, Ordering::Relaxed);
        let name = naming::binding_name(&self.shared.name, user);

        let mut events = BTreeMap::new();
        let completion = if self.shared.proxy {
            None
        } else {
            let executed = Arc::new(EventGenerator::void(BLOCKING_COMMAND_EXECUTED));
            let return_executed = Arc::new(EventGenerator::write(
                BLOCKING_COMMAND_RETURN_EXECUTED,
                Prototype::of::<String>(),
            ));
            events.insert(BLOCKING_COMMAND_EXECUTED.to_string(), Arc::clone(&executed));
            events.insert(
                BLOCKING_COMMAND_RETURN_EXECUTED.to_string(),
                Arc::clone(&return_executed),
            );
            Some(CompletionEvents {
                executed,
                return_executed,
            })
        };

        let commands = self.shared.commands.read();
        let queued = commands
            .by_kind
            .values()
            .flat_map(BTreeMap::values)
            .any(CommandRef::is_queued);
        let sizes = *self.shared.sizes.lock();
        let mailbox = queued.then(|| {
            Arc::new(Mailbox::new(
                name.clone(),
                sizes.mailbox,
                sizes.arguments,
                self.shared.on_queued.clone(),
                completion,
            ))
        });

        let table: KindTable = commands
            .by_kind
            .iter()
            .map(|(kind, entries)| {
                let entries = entries
                    .iter()
                    .map(|(name, entry)| {
                        let entry = match &mailbox {
                            Some(mailbox) => entry.bind(mailbox),
                            None => entry.clone(),
                        };
                        (name.clone(), entry)
                    })
                    .collect();
                (*kind, entries)
            })
            .collect();
        drop(commands);

        let binding = Binding {
            shared: Arc::new(BindingShared {
                key,
                owner_id: self.shared.id,
                owner: Arc::downgrade(&self.shared),
                user: user.to_string(),
                name,
                mailbox,
                commands: table,
                events,
            }),
        };
        self.shared.bindings.lock().insert(key, binding.clone());
        info!(
            "interface \"{}\": created binding \"{}\"{}",
            self.full_name(),
            binding.name(),
            if queued { "" } else { " (no mailbox)" }
        );
        binding
    }

    /// Removes a binding created by this interface and closes its mailbox.
    pub fn remove_binding(&self, binding: &Binding) -> Result<(), InterfaceError> {
        if binding.shared.owner_id != self.shared.id {
            error!(
                "remove_binding: \"{}\" was not created by interface \"{}\"",
                binding.name(),
                self.full_name()
            );
            return Err(InterfaceError::WrongOwner {
                interface: self.full_name(),
                binding: binding.name().to_string(),
            });
        }
        let removed = self.shared.bindings.lock().remove(&binding.shared.key);
        match removed {
            Some(binding) => {
                binding.release();
                info!(
                    "interface \"{}\": removed binding \"{}\"",
                    self.full_name(),
                    binding.name()
                );
                Ok(())
            }
            None => {
                warn!("remove_binding: \"{}\" already removed", binding.name());
                Err(InterfaceError::BindingNotFound {
                    interface: self.full_name(),
                    binding: binding.name().to_string(),
                })
            }
        }
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.shared.bindings.lock().values().cloned().collect()
    }

    pub fn binding_count(&self) -> usize {
        self.shared.bindings.lock().len()
    }

    pub fn user_names(&self) -> Vec<String> {
        self.shared
            .bindings
            .lock()
            .values()
            .map(|b| b.user_name().to_string())
            .collect()
    }

    /// Looks a binding up by user name or by full binding name.
    pub fn find_binding(&self, name: &str) -> Option<Binding> {
        self.shared
            .bindings
            .lock()
            .values()
            .find(|b| b.user_name() == name || b.name() == name)
            .cloned()
    }

    /// Drains every binding's mailbox. Each mailbox gets two passes, each
    /// bounded by the count pending when the pass starts.
    pub fn process_mailboxes(&self) -> usize {
        let bindings = self.bindings();
        let mut processed = 0;
        for binding in &bindings {
            let Some(mailbox) = binding.mailbox() else {
                continue;
            };
            for _ in 0..2 {
                let available = mailbox.len();
                for _ in 0..available {
                    if !mailbox.execute_next() {
                        break;
                    }
                    processed += 1;
                }
            }
        }
        processed
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn description(&self, serializer: &dyn PrototypeSerializer) -> InterfaceDescription {
        let commands = self.shared.commands.read();
        let commands = commands
            .by_kind
            .values()
            .flat_map(BTreeMap::values)
            .map(|entry| {
                let command = entry.command();
                CommandDescription {
                    name: command.name().to_string(),
                    kind: command.kind(),
                    queued: entry.is_queued(),
                    argument: command.argument().map(|p| serializer.describe(p)),
                    result: command.result().map(|p| serializer.describe(p)),
                }
            })
            .collect();
        let events = self.shared.events.read();
        let events = events
            .void
            .values()
            .chain(events.write.values())
            .map(|event| EventDescription {
                name: event.name().to_string(),
                kind: event.kind(),
                argument: event.argument().map(|p| serializer.describe(p)),
            })
            .collect();
        InterfaceDescription {
            component: self.shared.component.clone(),
            interface: self.shared.name.clone(),
            commands,
            events,
        }
    }
}

/// Failures are logged only for required observers.
fn observe(
    event: &EventGenerator,
    handler: CommandRef,
    required: bool,
) -> Result<(), InterfaceError> {
    event.add_observer(handler).inspect_err(|e| {
        if required {
            error!("add_observer: {e}");
        }
    })
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("name", &self.full_name())
            .field("queueing", &self.shared.queueing)
            .field("bindings", &self.binding_count())
            .finish()
    }
}

// ============================================================================
// Binding
// ============================================================================

struct BindingShared {
    key: u64,
    owner_id: u64,
    owner: Weak<InterfaceShared>,
    user: String,
    name: String,
    mailbox: Option<Arc<Mailbox>>,
    commands: KindTable,
    /// System completion events.
    events: BTreeMap<String, Arc<EventGenerator>>,
}

/// Per-client view of an [`Interface`].
#[derive(Clone)]
pub struct Binding {
    shared: Arc<BindingShared>,
}

impl Binding {
    /// `interface[user]`
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn user_name(&self) -> &str {
        &self.shared.user
    }

    pub fn mailbox(&self) -> Option<&Arc<Mailbox>> {
        self.shared.mailbox.as_ref()
    }

    pub fn owner(&self) -> Option<Interface> {
        self.shared.owner.upgrade().map(|shared| Interface { shared })
    }

    pub fn is_owned_by(&self, interface: &Interface) -> bool {
        self.shared.owner_id == interface.shared.id
    }

    pub fn command(&self, kind: CommandKind, name: &str) -> Option<CommandRef> {
        self.shared.commands.get(&kind)?.get(name).cloned()
    }

    pub fn names_of_commands(&self, kind: CommandKind) -> Vec<String> {
        self.shared
            .commands
            .get(&kind)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Local (system) event, without falling back to the owner.
    pub fn event(&self, name: &str) -> Option<Arc<EventGenerator>> {
        self.shared.events.get(name).cloned()
    }

    /// Observes a local completion event or, failing that, an event of the
    /// owning interface.
    pub fn add_observer(
        &self,
        name: &str,
        handler: CommandRef,
        required: bool,
    ) -> Result<(), InterfaceError> {
        if let Some(event) = self.event(name) {
            return observe(&event, handler, required);
        }
        self.owner_or_gone()?.add_observer(name, handler, required)
    }

    pub fn remove_observer(&self, name: &str, handler: &CommandRef) -> Result<(), InterfaceError> {
        if let Some(event) = self.event(name) {
            return event.remove_observer(handler);
        }
        self.owner_or_gone()?.remove_observer(name, handler)
    }

    fn owner_or_gone(&self) -> Result<Interface, InterfaceError> {
        self.owner().ok_or_else(|| InterfaceError::OwnerGone {
            binding: self.name().to_string(),
        })
    }

    /// Calls through this binding fail from now on.
    fn release(&self) {
        if let Some(mailbox) = &self.shared.mailbox {
            mailbox.close();
        }
    }

    pub fn is_released(&self) -> bool {
        self.shared.mailbox.as_ref().is_some_and(|m| m.is_closed())
    }

    /// Sends void command `name` without waiting.
    pub fn call_void(&self, name: &str) -> Result<Executed, CommandError> {
        self.lookup(CommandKind::Void, name)?.execute_void(Blocking::No)
    }

    /// Sends write command `name` without waiting.
    pub fn call_write(&self, name: &str, argument: &dyn Payload) -> Result<Executed, CommandError> {
        self.lookup(CommandKind::Write, name)?
            .execute_write(argument, Blocking::No)
    }

    fn lookup(&self, kind: CommandKind, name: &str) -> Result<CommandRef, CommandError> {
        self.command(kind, name).ok_or_else(|| CommandError::NotFound {
            command: name.to_string(),
            kind,
        })
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.shared.name)
            .field("mailbox", &self.shared.mailbox)
            .finish()
    }
}
