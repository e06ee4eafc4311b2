// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded mailbox of pending invocations.
//!
//! Every binding with queued commands owns one mailbox. Any thread may
//! enqueue; the component owning the provided interface drains it from its
//! own cycle through [`crate::Interface::process_mailboxes`]. Invocations run
//! in enqueue order.

use crate::command::{Command, Payload};
use crate::error::CommandError;
use crate::event::EventGenerator;
use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Callback run after every successful enqueue, typically to wake an
/// event-driven component.
pub type QueuedHook = Arc<dyn Fn() + Send + Sync>;

type Outcome = Result<Option<Box<dyn Payload>>, CommandError>;

/// One pending call: the command, its copied argument and, for blocking
/// callers, the token they wait on.
pub(crate) struct Invocation {
    pub(crate) command: Arc<Command>,
    pub(crate) argument: Option<Box<dyn Payload>>,
    pub(crate) completion: Option<Arc<Completion>>,
}

/// Completion token shared between a blocking caller and the mailbox.
pub(crate) struct Completion {
    slot: Mutex<Option<Outcome>>,
    done: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Outcome) {
        let mut slot = self.slot.lock();
        *slot = Some(outcome);
        self.done.notify_all();
    }

    /// Blocks until the owning thread ran the invocation. No timeout.
    pub(crate) fn wait(&self) -> Outcome {
        let mut slot = self.slot.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            self.done.wait(&mut slot);
        }
    }
}

/// System events fired after a blocking invocation completes.
#[derive(Clone)]
pub(crate) struct CompletionEvents {
    pub(crate) executed: Arc<EventGenerator>,
    pub(crate) return_executed: Arc<EventGenerator>,
}

/// Bounded multi-producer FIFO drained by a single owner.
pub struct Mailbox {
    name: String,
    queue: ArrayQueue<Invocation>,
    argument_capacity: usize,
    pending_arguments: AtomicUsize,
    closed: AtomicBool,
    on_queued: Option<QueuedHook>,
    events: Option<CompletionEvents>,
}

impl Mailbox {
    pub(crate) fn new(
        name: impl Into<String>,
        capacity: usize,
        argument_capacity: usize,
        on_queued: Option<QueuedHook>,
        events: Option<CompletionEvents>,
    ) -> Self {
        Self {
            name: name.into(),
            queue: ArrayQueue::new(capacity.max(1)),
            argument_capacity: argument_capacity.max(1),
            pending_arguments: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            on_queued,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn push(&self, invocation: Invocation) -> Result<(), CommandError> {
        if self.is_closed() {
            return Err(CommandError::Disabled {
                command: invocation.command.name().to_string(),
            });
        }

        let carries_argument = invocation.argument.is_some();
        if carries_argument && !self.reserve_argument() {
            warn!(
                "mailbox \"{}\": argument queue full ({}), dropping \"{}\"",
                self.name,
                self.argument_capacity,
                invocation.command.name()
            );
            return Err(CommandError::ArgumentQueueFull {
                mailbox: self.name.clone(),
            });
        }

        if let Err(rejected) = self.queue.push(invocation) {
            if carries_argument {
                self.pending_arguments.fetch_sub(1, Ordering::AcqRel);
            }
            warn!(
                "mailbox \"{}\" full ({}), dropping \"{}\"",
                self.name,
                self.queue.capacity(),
                rejected.command.name()
            );
            return Err(CommandError::MailboxFull {
                mailbox: self.name.clone(),
            });
        }

        // Closed while we were pushing: nobody will drain us.
        if self.is_closed() {
            self.discard_pending();
        }

        if let Some(hook) = &self.on_queued {
            hook();
        }
        Ok(())
    }

    fn reserve_argument(&self) -> bool {
        self.pending_arguments
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                (pending < self.argument_capacity).then_some(pending + 1)
            })
            .is_ok()
    }

    fn pop(&self) -> Option<Invocation> {
        let invocation = self.queue.pop()?;
        if invocation.argument.is_some() {
            self.pending_arguments.fetch_sub(1, Ordering::AcqRel);
        }
        Some(invocation)
    }

    /// Runs the oldest pending invocation. Returns false when empty.
    pub fn execute_next(&self) -> bool {
        let Some(invocation) = self.pop() else {
            return false;
        };

        let kind = invocation.command.kind();
        let outcome = invocation.command.invoke(invocation.argument.as_deref());
        trace!(
            "mailbox \"{}\": executed \"{}\"",
            self.name,
            invocation.command.name()
        );

        match invocation.completion {
            Some(completion) => {
                completion.complete(outcome);
                self.notify_completion(invocation.command.name(), kind.returns_result());
            }
            None => {
                if let Err(e) = outcome {
                    warn!("mailbox \"{}\": {}", self.name, e);
                }
            }
        }
        true
    }

    fn notify_completion(&self, command: &str, returned: bool) {
        let Some(events) = &self.events else {
            return;
        };
        if returned {
            events.return_executed.trigger_with(&command.to_string());
        } else {
            events.executed.trigger();
        }
    }

    /// Rejects further calls and releases every blocked caller.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.discard_pending();
    }

    fn discard_pending(&self) {
        while let Some(invocation) = self.pop() {
            if let Some(completion) = invocation.completion {
                completion.complete(Err(CommandError::Disabled {
                    command: invocation.command.name().to_string(),
                }));
            }
        }
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
