mod common;

use std::time::Duration;

use queuep::{PublishOutcome, QueueOptions, Registry};
use serde_json::json;
use tokio::time::sleep;

use common::{init_logging, recording_consumer};

#[tokio::test(start_paused = true)]
async fn publish_coalesce_and_consume_through_registry() {
    init_logging();
    let (consumer, calls) = recording_consumer();
    let registry = Registry::new();
    let q1 = registry
        .init_queue("q1", QueueOptions::new().interval_ms(50).consumer(consumer))
        .unwrap();

    assert_eq!(q1.publish("k1", json!({"v": 1})).await.unwrap(), PublishOutcome::Enqueued);

    // First tick is one interval after start.
    sleep(Duration::from_millis(40)).await;
    assert!(calls.lock().is_empty());
    sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.lock().as_slice(), &[("k1".to_string(), json!({"v": 1}))]);

    assert_eq!(q1.publish("k1", json!({"v": 1})).await.unwrap(), PublishOutcome::Skipped);
    sleep(Duration::from_millis(60)).await;
    assert_eq!(calls.lock().len(), 1);

    assert_eq!(q1.publish("k1", json!({"v": 2})).await.unwrap(), PublishOutcome::Enqueued);
    sleep(Duration::from_millis(60)).await;
    let calls = calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], ("k1".to_string(), json!({"v": 2})));

    let stats = q1.get_stats().unwrap();
    assert_eq!(stats.processed_count, 2);
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.interval_ms, 50);
}

#[tokio::test(start_paused = true)]
async fn burst_for_one_key_is_consumed_once_with_latest_value() {
    init_logging();
    let (consumer, calls) = recording_consumer();
    let registry = Registry::new();
    let queue = registry
        .init_queue("burst", QueueOptions::new().interval_ms(50).consumer(consumer))
        .unwrap();

    for v in 0..100 {
        queue.publish("sensor", json!({"v": v})).await.unwrap();
    }
    assert_eq!(queue.get_stats().unwrap().queue_length, 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.lock().as_slice(), &[("sensor".to_string(), json!({"v": 99}))]);
}

#[tokio::test(start_paused = true)]
async fn keys_are_consumed_one_per_interval_in_arrival_order() {
    init_logging();
    let (consumer, calls) = recording_consumer();
    let registry = Registry::new();
    let queue = registry
        .init_queue("fifo", QueueOptions::new().interval_ms(10).consumer(consumer))
        .unwrap();

    for key in ["a", "b", "c"] {
        queue.publish(key, json!(key)).await.unwrap();
    }
    // Re-publishing "a" must not move it behind "c".
    queue.publish("a", json!("a2")).await.unwrap();

    sleep(Duration::from_millis(15)).await;
    assert_eq!(calls.lock().len(), 1);

    sleep(Duration::from_millis(30)).await;
    let keys: Vec<String> = calls.lock().iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert_eq!(calls.lock()[0].1, json!("a2"));
}

#[tokio::test(start_paused = true)]
async fn removed_queue_stops_consuming() {
    init_logging();
    let (consumer, calls) = recording_consumer();
    let registry = Registry::new();
    let queue = registry
        .init_queue("gone", QueueOptions::new().interval_ms(50).consumer(consumer))
        .unwrap();
    let engine = registry.get_queue("gone").unwrap();

    queue.publish("k", json!(1)).await.unwrap();
    registry.remove_queue("gone").unwrap();

    sleep(Duration::from_millis(200)).await;
    assert!(calls.lock().is_empty());
    assert!(!engine.is_running());
    assert_eq!(engine.pending_len(), 1);
}
