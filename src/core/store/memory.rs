use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::core::entry::Entry;
use crate::core::error::StoreError;
use crate::core::store::{Store, StoreFactory};

/// In-process store scoped to one queue.
#[derive(Debug, Default)]
pub struct MemoryStore {
    queue_id: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new(queue_id: impl Into<String>) -> Self {
        Self {
            queue_id: queue_id.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Factory producing a fresh, private store per queue.
    pub fn factory() -> StoreFactory {
        Arc::new(|queue_id: &str| Arc::new(MemoryStore::new(queue_id)) as Arc<dyn Store>)
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_entry(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set_entry(&self, key: &str, entry: Entry) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn mark_entry_as_done(&self, key: &str, consumed: &Entry) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(stored) if stored.same_write(consumed) => stored.is_dirty = false,
            Some(_) => {
                trace!(queue = %self.queue_id, key, "newer write pending; leaving entry dirty");
            }
            None => {}
        }
        Ok(())
    }
}
