mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use queuep::{
    Entry, MemoryStore, QueueOptions, Registry, Store, StoreError, StoreFactory, TickOutcome,
};
use serde_json::json;

use common::{init_logging, recording_consumer};

/// Store that keeps entries serialized as JSON text.
#[derive(Default)]
struct JsonStore {
    rows: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl Store for JsonStore {
    async fn get_entry(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let raw = self.rows.lock().get(key).cloned();
        raw.map(|r| serde_json::from_str(&r).map_err(StoreError::from))
            .transpose()
    }

    async fn set_entry(&self, key: &str, entry: Entry) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&entry)?;
        self.rows.lock().insert(key.to_string(), raw);
        Ok(())
    }

    async fn mark_entry_as_done(&self, key: &str, consumed: &Entry) -> Result<(), StoreError> {
        let Some(mut current) = self.get_entry(key).await? else {
            return Ok(());
        };
        if current.same_write(consumed) {
            current.is_dirty = false;
            self.set_entry(key, current).await?;
        }
        Ok(())
    }
}

fn json_factory(created: Arc<Mutex<Vec<String>>>) -> StoreFactory {
    Arc::new(move |queue_id: &str| -> Arc<dyn Store> {
        created.lock().push(queue_id.to_string());
        Arc::new(JsonStore::default())
    })
}

#[tokio::test]
async fn registry_default_store_is_used_for_new_queues() {
    init_logging();
    let created = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::with_store(json_factory(created.clone()));
    let (consumer, calls) = recording_consumer();

    let q = registry
        .init_queue(
            "json",
            QueueOptions::new()
                .interval(Duration::from_secs(3600))
                .consumer(consumer),
        )
        .unwrap();
    assert_eq!(created.lock().as_slice(), &["json".to_string()]);

    q.publish("k", json!({"v": 1})).await.unwrap();
    let engine = registry.get_queue("json").unwrap();
    assert_eq!(engine.tick().await, TickOutcome::Consumed);
    assert_eq!(calls.lock()[0].1, json!({"v": 1}));

    // Switching the registry default leaves running queues alone.
    registry.use_store(MemoryStore::factory());
    q.publish("k", json!({"v": 2})).await.unwrap();
    assert_eq!(created.lock().len(), 1);
}

#[tokio::test]
async fn set_store_swaps_backing_store_of_one_queue() {
    init_logging();
    let created = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new();
    let (consumer, _calls) = recording_consumer();
    let q = registry
        .init_queue(
            "swap",
            QueueOptions::new()
                .interval(Duration::from_secs(3600))
                .consumer(consumer),
        )
        .unwrap();

    q.publish("k", json!(1)).await.unwrap();
    q.set_store(&json_factory(created.clone())).unwrap();
    assert_eq!(created.lock().as_slice(), &["swap".to_string()]);

    let engine = registry.get_queue("swap").unwrap();
    // The key is pending but the new store has no entry for it.
    assert_eq!(engine.tick().await, TickOutcome::Stale);
}

#[tokio::test]
async fn per_queue_store_factory_overrides_registry_default() {
    init_logging();
    let created = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new();
    let (consumer, _calls) = recording_consumer();
    registry
        .init_queue(
            "own",
            QueueOptions::new()
                .interval(Duration::from_secs(3600))
                .store_factory(json_factory(created.clone()))
                .consumer(consumer),
        )
        .unwrap();
    assert_eq!(created.lock().as_slice(), &["own".to_string()]);
}
