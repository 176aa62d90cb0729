//! Pending entry stored per (queue, key).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The last accepted value for a key plus its bookkeeping.
///
/// Field names serialize in camelCase so stores sharing data with other
/// producers see the `{data, isDirty, time, skippedCount}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub data: Value,
    pub is_dirty: bool,
    /// Timestamp (ms) of the last accepted write.
    pub time: u64,
    /// Publishes rejected by the dirty checker since the last accepted write.
    pub skipped_count: u64,
}

impl Entry {
    /// A freshly accepted write: dirty, stamped now, skip counter reset.
    pub fn dirty(data: Value) -> Self {
        Self {
            data,
            is_dirty: true,
            time: current_timestamp(),
            skipped_count: 0,
        }
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            time: Some(self.time),
            skipped_count: self.skipped_count,
            is_dirty: self.is_dirty,
        }
    }

    /// True when `other` is the same accepted write as `self`.
    pub fn same_write(&self, other: &Entry) -> bool {
        self.time == other.time && self.data == other.data
    }
}

/// Metadata handed to dirty checkers alongside the values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMeta {
    /// `None` when the key has never been written.
    pub time: Option<u64>,
    pub skipped_count: u64,
    pub is_dirty: bool,
}
