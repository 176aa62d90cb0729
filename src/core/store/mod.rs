//! Pending-entry storage.
//!
//! A [`Store`] holds one [`Entry`] per key inside a single queue's namespace.
//! Queues only talk to stores through this trait, so a networked backend can
//! replace the in-process [`MemoryStore`] without touching the engine.

pub mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::entry::Entry;
use crate::core::error::StoreError;

#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the entry for `key`, `None` if it was never written.
    async fn get_entry(&self, key: &str) -> Result<Option<Entry>, StoreError>;

    /// Insert or overwrite the entry for `key`.
    async fn set_entry(&self, key: &str, entry: Entry) -> Result<(), StoreError>;

    /// Clear the dirty flag of the write that was just consumed.
    ///
    /// Must be idempotent. Implementations must leave a newer write (one whose
    /// `time`/`data` differ from `consumed`) dirty.
    async fn mark_entry_as_done(&self, key: &str, consumed: &Entry) -> Result<(), StoreError>;
}

/// Builds the store for a queue id.
pub type StoreFactory = Arc<dyn Fn(&str) -> Arc<dyn Store> + Send + Sync>;
