use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::QueueError;

/// What to do when a bounded queue is asked to take one more key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the new key; the publish fails with `QueueFull`.
    #[default]
    Reject,
    /// Evict the oldest pending key to make room.
    DropOldest,
}

impl FromStr for OverflowPolicy {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(OverflowPolicy::Reject),
            "drop_oldest" | "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            other => Err(QueueError::config(format!(
                "unknown overflow policy `{other}`"
            ))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Reject => f.write_str("reject"),
            OverflowPolicy::DropOldest => f.write_str("drop_oldest"),
        }
    }
}

/// Result of asking the pending set to take a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Admission {
    Enqueued,
    AlreadyPending,
    /// The key is being consumed; it will be enqueued when that finishes.
    Deferred,
    /// Enqueued after evicting the contained (oldest) key.
    Evicted(String),
    Rejected,
}

/// Ordered set of keys awaiting consumption plus the in-flight guard.
///
/// `order` and `members` always hold the same keys. A key is never in both
/// `members` and `in_flight`; publishes for an in-flight key land in
/// `deferred` until [`complete`](Self::complete) is called.
#[derive(Debug, Default)]
pub(crate) struct PendingKeys {
    order: VecDeque<String>,
    members: HashSet<String>,
    in_flight: HashSet<String>,
    deferred: HashSet<String>,
    capacity: Option<usize>,
    policy: OverflowPolicy,
}

impl PendingKeys {
    pub(crate) fn new(capacity: Option<usize>, policy: OverflowPolicy) -> Self {
        Self {
            capacity,
            policy,
            ..Self::default()
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub(crate) fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    pub(crate) fn admit(&mut self, key: &str) -> Admission {
        if self.in_flight.contains(key) {
            self.deferred.insert(key.to_string());
            return Admission::Deferred;
        }
        if self.members.contains(key) {
            return Admission::AlreadyPending;
        }

        let mut evicted = None;
        if let Some(capacity) = self.capacity {
            if self.order.len() >= capacity {
                match self.policy {
                    OverflowPolicy::Reject => return Admission::Rejected,
                    OverflowPolicy::DropOldest => {
                        evicted = self.order.pop_front();
                        if let Some(old) = &evicted {
                            self.members.remove(old);
                        }
                    }
                }
            }
        }

        self.order.push_back(key.to_string());
        self.members.insert(key.to_string());

        match evicted {
            Some(old) => Admission::Evicted(old),
            None => Admission::Enqueued,
        }
    }

    /// Pops the oldest key and marks it in flight.
    ///
    /// The flag is true when this pop drained the set.
    pub(crate) fn pop(&mut self) -> Option<(String, bool)> {
        let key = self.order.pop_front()?;
        self.members.remove(&key);
        self.in_flight.insert(key.clone());
        Some((key, self.order.is_empty()))
    }

    /// Clears the in-flight marker and admits the key again if a publish was
    /// deferred while it ran.
    pub(crate) fn complete(&mut self, key: &str) -> Option<Admission> {
        self.in_flight.remove(key);
        if self.deferred.remove(key) {
            Some(self.admit(key))
        } else {
            None
        }
    }
}
