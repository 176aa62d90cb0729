//! QueueP – a congestion-control coalescing queue.
//!
//! Producers publish `(key, value)` pairs far faster than the downstream
//! consumer should be called. Each queue keeps only the latest accepted value
//! per key, filters publishes through a pluggable dirty checker, and invokes
//! the consumer for at most one key per interval.
//!
//! This crate exports
//!  * `core`    – queue engine, dirty checkers, stores, registry
//!  * `config`  – TOML-driven queue definitions
//!  * `logging` – `tracing` subscriber setup
//!
//! ```no_run
//! use queuep::{Consumer, QueueOptions, Registry};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), queuep::QueueError> {
//! let registry = Registry::new();
//! let queue = registry.init_queue(
//!     "telemetry",
//!     QueueOptions::new()
//!         .interval_ms(50)
//!         .consumer(Consumer::from_async(|key, data| async move {
//!             println!("{key} -> {data}");
//!             Ok(())
//!         })),
//! )?;
//! queue.publish("sensor-1", json!({ "value": 42 })).await?;
//! # Ok(())
//! # }
//! ```

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod config;
pub mod core;
pub mod logging;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use config::{load_config, Config, ConfigError};
pub use core::consumer::{Completion, Consumer};
pub use core::dirty::{DirtyChecker, DirtyCheckerConfig, SharedChecker, TimeUnit};
pub use core::entry::{Entry, EntryMeta};
pub use core::error::{QueueError, StoreError};
pub use core::event::{EventContext, QueueEvent};
pub use core::handle::QueueHandle;
pub use core::queue::{
    OverflowPolicy, PublishOutcome, Queue, QueueOptions, QueueStats, TickOutcome,
};
pub use core::registry::Registry;
pub use core::store::{MemoryStore, Store, StoreFactory};
