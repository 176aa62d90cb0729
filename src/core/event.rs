//! Queue lifecycle events and their handler table.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEvent {
    /// A consumer invocation failed.
    Error,
    /// A tick drained the last pending key.
    Empty,
    /// The pending set hit its capacity.
    Full,
    /// A publish or a tick found nothing new to do for a key.
    Duplicate,
    /// A dirty publish was accepted.
    Enqueue,
    /// A consumer invocation succeeded.
    Consume,
}

impl QueueEvent {
    pub const ALL: [QueueEvent; 6] = [
        QueueEvent::Error,
        QueueEvent::Empty,
        QueueEvent::Full,
        QueueEvent::Duplicate,
        QueueEvent::Enqueue,
        QueueEvent::Consume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueEvent::Error => "error",
            QueueEvent::Empty => "empty",
            QueueEvent::Full => "full",
            QueueEvent::Duplicate => "duplicate",
            QueueEvent::Enqueue => "enqueue",
            QueueEvent::Consume => "consume",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueEvent {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueEvent::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| QueueError::config(format!("unsupported event `{s}`")))
    }
}

/// What a handler gets told about an event.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub event: QueueEvent,
    pub queue_id: &'a str,
    pub key: Option<&'a str>,
    pub error: Option<&'a QueueError>,
}

pub type EventHandler = Arc<dyn Fn(&EventContext<'_>) + Send + Sync>;

/// One handler slot per event, each a no-op until replaced.
#[derive(Clone)]
pub struct EventHandlers {
    slots: [EventHandler; 6],
}

impl EventHandlers {
    pub fn new() -> Self {
        let noop: EventHandler = Arc::new(|_: &EventContext<'_>| {});
        Self {
            slots: std::array::from_fn(|_| noop.clone()),
        }
    }

    pub fn set(&mut self, event: QueueEvent, handler: EventHandler) {
        self.slots[event.index()] = handler;
    }

    pub fn get(&self, event: QueueEvent) -> EventHandler {
        self.slots[event.index()].clone()
    }
}

impl Default for EventHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers").finish_non_exhaustive()
    }
}
