// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event generators: multicast commands fanning out to observer commands.

use crate::command::{Blocking, CommandKind, CommandRef, Payload, Prototype};
use crate::error::InterfaceError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Void,
    Write,
}

impl EventKind {
    fn handler_kind(self) -> CommandKind {
        match self {
            EventKind::Void => CommandKind::Void,
            EventKind::Write => CommandKind::Write,
        }
    }
}

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

/// Named multicast command with an ordered observer list.
pub struct EventGenerator {
    name: String,
    kind: EventKind,
    argument: Option<Prototype>,
    observers: RwLock<Vec<CommandRef>>,
}

impl EventGenerator {
    pub(crate) fn void(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EventKind::Void,
            argument: None,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn write(name: impl Into<String>, argument: Prototype) -> Self {
        Self {
            name: name.into(),
            kind: EventKind::Write,
            argument: Some(argument),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn argument(&self) -> Option<&Prototype> {
        self.argument.as_ref()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Appends `handler`; void events take void handlers, write events take
    /// write handlers with the same argument type.
    pub fn add_observer(&self, handler: CommandRef) -> Result<(), InterfaceError> {
        let compatible = handler.kind() == self.kind.handler_kind()
            && match (&self.argument, handler.command().argument()) {
                (Some(event), Some(handler)) => event.same_type(handler),
                (None, None) => true,
                _ => false,
            };
        if !compatible {
            return Err(InterfaceError::HandlerMismatch {
                event: self.name.clone(),
                handler: handler.name().to_string(),
            });
        }
        self.observers.write().push(handler);
        Ok(())
    }

    pub fn remove_observer(&self, handler: &CommandRef) -> Result<(), InterfaceError> {
        let mut observers = self.observers.write();
        match observers.iter().position(|o| o.same_target(handler)) {
            Some(index) => {
                observers.remove(index);
                Ok(())
            }
            None => Err(InterfaceError::ObserverNotRegistered {
                event: self.name.clone(),
                handler: handler.name().to_string(),
            }),
        }
    }

    /// Fires a void event.
    pub fn trigger(&self) -> Delivery {
        self.fan_out(None)
    }

    /// Fires a write event with `payload`.
    pub fn trigger_with(&self, payload: &dyn Payload) -> Delivery {
        if let Some(prototype) = &self.argument {
            if !prototype.accepts(payload) {
                warn!(
                    "event \"{}\" expects {}, got {}",
                    self.name,
                    prototype.type_name(),
                    payload.type_name()
                );
                return Delivery {
                    delivered: 0,
                    failed: self.observer_count(),
                };
            }
        }
        self.fan_out(Some(payload))
    }

    // Handlers run in registration order; a failing handler does not stop
    // the others.
    fn fan_out(&self, payload: Option<&dyn Payload>) -> Delivery {
        let observers = self.observers.read().clone();
        let mut delivery = Delivery::default();
        for handler in &observers {
            match handler.execute(payload, Blocking::No) {
                Ok(_) => delivery.delivered += 1,
                Err(e) => {
                    warn!("event \"{}\": handler \"{}\" failed: {}", self.name, handler.name(), e);
                    delivery.failed += 1;
                }
            }
        }
        delivery
    }
}

impl fmt::Debug for EventGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGenerator")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> CommandRef {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        let command = Command::void(tag.clone(), move || log.lock().push(tag.clone()));
        CommandRef::Direct(Arc::new(command))
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let event = EventGenerator::void("Started");
        event.add_observer(recorder(&log, "a")).unwrap();
        event.add_observer(recorder(&log, "b")).unwrap();
        event.add_observer(recorder(&log, "c")).unwrap();

        let delivery = event.trigger();
        assert_eq!(delivery.delivered, 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_fan_out() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let event = EventGenerator::void("Started");
        event.add_observer(recorder(&log, "first")).unwrap();
        // Queued handler without a mailbox always fails.
        let unbound = CommandRef::Queued(crate::command::QueuedCommand::unbound(Arc::new(
            Command::void("broken", || {}),
        )));
        event.add_observer(unbound).unwrap();
        event.add_observer(recorder(&log, "last")).unwrap();

        let delivery = event.trigger();
        assert_eq!(delivery, Delivery { delivered: 2, failed: 1 });
        assert_eq!(*log.lock(), vec!["first", "last"]);
    }

    #[test]
    fn test_write_event_checks_handler_type() {
        let event = EventGenerator::write("Position", Prototype::of::<f64>());
        let wrong = CommandRef::Direct(Arc::new(Command::write("OnInt", |_: &i32| {})));
        let void = CommandRef::Direct(Arc::new(Command::void("OnVoid", || {})));
        assert!(event.add_observer(wrong).is_err());
        assert!(event.add_observer(void).is_err());

        let seen = Arc::new(Mutex::new(0.0));
        let sink = Arc::clone(&seen);
        let handler = CommandRef::Direct(Arc::new(Command::write("OnPosition", move |x: &f64| {
            *sink.lock() = *x;
        })));
        event.add_observer(handler).unwrap();
        event.trigger_with(&1.5_f64);
        assert_eq!(*seen.lock(), 1.5);
    }

    #[test]
    fn test_remove_observer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let event = EventGenerator::void("Stopped");
        let handler = recorder(&log, "h");
        event.add_observer(handler.clone()).unwrap();

        event.remove_observer(&handler).unwrap();
        assert_eq!(event.observer_count(), 0);
        assert!(matches!(
            event.remove_observer(&handler),
            Err(InterfaceError::ObserverNotRegistered { .. })
        ));
    }
}
