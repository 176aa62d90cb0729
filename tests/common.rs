#![allow(dead_code)]

use std::sync::{Arc, Once};

use parking_lot::Mutex;
use queuep::Consumer;
use serde_json::Value;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        queuep::logging::init_logging_with("debug");
    });
}

pub type Calls = Arc<Mutex<Vec<(String, Value)>>>;

/// Consumer that records every invocation and always succeeds.
pub fn recording_consumer() -> (Consumer, Calls) {
    let calls: Calls = Arc::default();
    let sink = calls.clone();
    let consumer = Consumer::from_async(move |key, data| {
        let sink = sink.clone();
        async move {
            sink.lock().push((key, data));
            Ok(())
        }
    });
    (consumer, calls)
}
