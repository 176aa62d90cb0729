use std::sync::Arc;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, Level};

use crate::core::error::QueueError;
use crate::core::event::{EventContext, QueueEvent};
use crate::core::handle::QueueHandle;
use crate::core::queue::{PublishOutcome, Queue, QueueOptions, QueueStats};
use crate::core::store::{MemoryStore, StoreFactory};

/// [`Registry`] maps queue identifiers to running queues.
///
/// It is an ordinary value: create one, pass clones where needed, drop it to
/// stop every queue it owns. Clones share the same queues.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    queues: DashMap<String, Arc<Queue>>,
    default_store: RwLock<StoreFactory>,
}

impl Registry {
    /// Creates an empty registry backed by [`MemoryStore`].
    pub fn new() -> Self {
        Self::with_store(MemoryStore::factory())
    }

    pub fn with_store(factory: StoreFactory) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                queues: DashMap::new(),
                default_store: RwLock::new(factory),
            }),
        }
    }

    /// Changes the store used by future [`init_queue`](Self::init_queue)
    /// calls. Running queues keep their store.
    pub fn use_store(&self, factory: StoreFactory) {
        *self.inner.default_store.write() = factory;
    }

    /// Creates and starts the queue `id`.
    ///
    /// Fails with `AlreadyInitialized` if `id` is taken; call
    /// [`remove_queue`](Self::remove_queue) first to replace it.
    ///
    /// The store factory runs before any registry lock is taken, so it may
    /// call back into this registry.
    pub fn init_queue(
        &self,
        id: impl Into<String>,
        options: QueueOptions,
    ) -> Result<QueueHandle, QueueError> {
        let id = id.into();
        if self.inner.queues.contains_key(&id) {
            return Err(QueueError::AlreadyInitialized(id));
        }

        let default_store = self.inner.default_store.read().clone();
        let queue = Arc::new(Queue::new(id.clone(), options, &default_store)?);

        match self.inner.queues.entry(id.clone()) {
            MapEntry::Occupied(_) => Err(QueueError::AlreadyInitialized(id)),
            MapEntry::Vacant(slot) => {
                queue.start_worker()?;
                slot.insert(queue);
                info!(queue = %id, "queue initialized");
                Ok(QueueHandle::new(id, self.clone()))
            }
        }
    }

    /// Stops and forgets the queue `id`.
    pub fn remove_queue(&self, id: &str) -> Result<(), QueueError> {
        let (_, queue) = self
            .inner
            .queues
            .remove(id)
            .ok_or_else(|| QueueError::UnknownQueue(id.to_string()))?;
        queue.stop();
        debug!(queue = %id, "queue removed");
        Ok(())
    }

    /// The engine behind `id`.
    pub fn get_queue(&self, id: &str) -> Result<Arc<Queue>, QueueError> {
        self.inner
            .queues
            .get(id)
            .map(|q| Arc::clone(&*q))
            .ok_or_else(|| QueueError::UnknownQueue(id.to_string()))
    }

    /// A handle to the existing queue `id`.
    pub fn get_queue_instance(&self, id: &str) -> Result<QueueHandle, QueueError> {
        if !self.inner.queues.contains_key(id) {
            return Err(QueueError::UnknownQueue(id.to_string()));
        }
        Ok(QueueHandle::new(id.to_string(), self.clone()))
    }

    pub async fn get_queue_instance_async(&self, id: &str) -> Result<QueueHandle, QueueError> {
        self.get_queue_instance(id)
    }

    pub fn queue_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .queues
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn publish(
        &self,
        id: &str,
        key: &str,
        data: Value,
    ) -> Result<PublishOutcome, QueueError> {
        let queue = self.get_queue(id)?;
        queue.publish(key, data).await
    }

    pub fn get_stats(&self, id: &str) -> Result<QueueStats, QueueError> {
        Ok(self.get_queue(id)?.stats())
    }

    /// Logs the stats of `id` at INFO.
    pub fn print_stats(&self, id: &str) -> Result<(), QueueError> {
        self.print_stats_at(id, Level::INFO)
    }

    pub fn print_stats_at(&self, id: &str, level: Level) -> Result<(), QueueError> {
        self.get_queue(id)?.print_stats_at(level);
        Ok(())
    }

    pub fn on<F>(&self, id: &str, event: QueueEvent, handler: F) -> Result<(), QueueError>
    where
        F: Fn(&EventContext<'_>) + Send + Sync + 'static,
    {
        self.get_queue(id)?.on(event, handler);
        Ok(())
    }

    pub fn set_store(&self, id: &str, factory: &StoreFactory) -> Result<(), QueueError> {
        self.get_queue(id)?.set_store(factory);
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("queues", &self.queue_ids())
            .finish()
    }
}
