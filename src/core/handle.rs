use serde_json::Value;
use tracing::Level;

use crate::core::error::QueueError;
use crate::core::event::{EventContext, QueueEvent};
use crate::core::queue::{PublishOutcome, QueueStats};
use crate::core::registry::Registry;
use crate::core::store::StoreFactory;

/// Reference to one queue of a [`Registry`], by identifier.
///
/// Every call is resolved through the registry, so a handle to a removed
/// queue fails with `UnknownQueue` instead of reaching a stopped engine.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    id: String,
    registry: Registry,
}

impl QueueHandle {
    pub(crate) fn new(id: String, registry: Registry) -> Self {
        Self { id, registry }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn publish(&self, key: &str, data: Value) -> Result<PublishOutcome, QueueError> {
        self.registry.publish(&self.id, key, data).await
    }

    pub fn get_stats(&self) -> Result<QueueStats, QueueError> {
        self.registry.get_stats(&self.id)
    }

    pub fn print_stats(&self) -> Result<(), QueueError> {
        self.registry.print_stats(&self.id)
    }

    pub fn print_stats_at(&self, level: Level) -> Result<(), QueueError> {
        self.registry.print_stats_at(&self.id, level)
    }

    pub fn on<F>(&self, event: QueueEvent, handler: F) -> Result<(), QueueError>
    where
        F: Fn(&EventContext<'_>) + Send + Sync + 'static,
    {
        self.registry.on(&self.id, event, handler)
    }

    pub fn set_store(&self, factory: &StoreFactory) -> Result<(), QueueError> {
        self.registry.set_store(&self.id, factory)
    }
}
