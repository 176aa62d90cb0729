//! Coalescing queue engine.
//!
//! One [`Queue`] per identifier. Publishes are filtered through the queue's
//! dirty checker; accepted values overwrite the stored entry and put the key
//! (once) on the pending FIFO. A recurring worker pops one key per interval
//! and hands the latest value to the consumer.
//!
//! Per key: `absent -> dirty (pending) -> in flight -> clean`, and back to
//! dirty on the next accepted publish. Publishes accepted while a key is in
//! flight are persisted but only re-enqueued once that invocation finishes,
//! so a key is never consumed twice concurrently.
//!
//! Failed consumptions are counted and reported through the `error` event.
//! They are not retried; the entry stays dirty until a later publish is
//! accepted.

pub mod options;
pub mod pending;
mod worker;

pub use options::{QueueOptions, DEFAULT_INTERVAL};
pub use pending::OverflowPolicy;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn, Level};

use crate::core::consumer::Consumer;
use crate::core::dirty::{self, SharedChecker};
use crate::core::entry::{current_timestamp, Entry};
use crate::core::error::QueueError;
use crate::core::event::{EventContext, EventHandler, EventHandlers, QueueEvent};
use crate::core::store::{Store, StoreFactory};

use pending::{Admission, PendingKeys};

/// How a publish was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Accepted and pending (or already pending) consumption.
    Enqueued,
    /// Accepted while the key is being consumed; enqueued once that finishes.
    Deferred,
    /// Rejected by the dirty checker.
    Skipped,
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Enqueued => f.write_str("Enqueued for processing"),
            PublishOutcome::Deferred => f.write_str("Deferred until in-flight consumption completes"),
            PublishOutcome::Skipped => f.write_str("Skipping duplicate"),
        }
    }
}

/// What one worker tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was pending.
    Idle,
    /// The popped key had no dirty entry.
    Stale,
    Consumed,
    Failed,
}

/// Point-in-time counters of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue_length: usize,
    pub interval_ms: u64,
    pub processed_count: u64,
    pub failure_count: u64,
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "remaining entries: {}", self.queue_length)?;
        writeln!(f, "interval: {}ms", self.interval_ms)?;
        writeln!(f, "processed: {}", self.processed_count)?;
        write!(f, "failed: {}", self.failure_count)
    }
}

pub struct Queue {
    id: String,
    interval: Duration,
    dirty_checker: SharedChecker,
    consumer: Consumer,
    store: RwLock<Arc<dyn Store>>,
    pending: Mutex<PendingKeys>,
    handlers: RwLock<EventHandlers>,
    processed_count: AtomicU64,
    failure_count: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Queue {
    /// Builds a queue without starting its worker.
    ///
    /// `default_store` is used when `options` carries no store factory.
    pub fn new(
        id: impl Into<String>,
        options: QueueOptions,
        default_store: &StoreFactory,
    ) -> Result<Self, QueueError> {
        options.validate()?;
        let id = id.into();

        let QueueOptions {
            interval,
            dirty_checker,
            consumer,
            store_factory,
            capacity,
            overflow_policy,
        } = options;

        let consumer = consumer.ok_or_else(|| QueueError::config("a consumer is required"))?;
        let store = match &store_factory {
            Some(factory) => factory(&id),
            None => default_store(&id),
        };

        Ok(Self {
            interval,
            dirty_checker: dirty_checker.unwrap_or_else(dirty::naive),
            consumer,
            store: RwLock::new(store),
            pending: Mutex::new(PendingKeys::new(capacity, overflow_policy)),
            handlers: RwLock::new(EventHandlers::new()),
            processed_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            worker: Mutex::new(None),
            id,
        })
    }

    /// Starts the recurring worker. Must be called inside a tokio runtime.
    ///
    /// A worker that is already running is left alone.
    pub fn start_worker(self: &Arc<Self>) -> Result<(), QueueError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| QueueError::config("starting a queue worker requires a tokio runtime"))?;

        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        *worker = Some(worker::spawn(&runtime, self));
        debug!(queue = %self.id, interval_ms = self.interval.as_millis() as u64, "worker started");
        Ok(())
    }

    /// Stops the worker. Pending keys stay put and can still be drained with
    /// [`tick`](Self::tick).
    pub fn stop(&self) {
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
            debug!(queue = %self.id, "worker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replaces the handler for `event`.
    pub fn on<F>(&self, event: QueueEvent, handler: F)
    where
        F: Fn(&EventContext<'_>) + Send + Sync + 'static,
    {
        self.handlers.write().set(event, Arc::new(handler));
    }

    /// Swaps the backing store. Entries in the old store are not migrated.
    pub fn set_store(&self, factory: &StoreFactory) {
        *self.store.write() = factory(&self.id);
        debug!(queue = %self.id, "store replaced");
    }

    fn store(&self) -> Arc<dyn Store> {
        self.store.read().clone()
    }

    /// Runs the handler for `event`. A panicking handler is logged and
    /// otherwise ignored.
    fn emit(&self, event: QueueEvent, key: Option<&str>, error: Option<&QueueError>) {
        let handler: EventHandler = self.handlers.read().get(event);
        let ctx = EventContext {
            event,
            queue_id: &self.id,
            key,
            error,
        };
        if panic::catch_unwind(AssertUnwindSafe(|| handler(&ctx))).is_err() {
            error!(queue = %self.id, event = %event, "event handler panicked");
        }
    }

    /// Offers `data` for `key`.
    ///
    /// Store failures are returned; nothing is enqueued in that case.
    pub async fn publish(&self, key: &str, data: Value) -> Result<PublishOutcome, QueueError> {
        let store = self.store();
        let existing = store.get_entry(key).await?;

        let meta = existing.as_ref().map(Entry::meta).unwrap_or_default();
        let previous = existing.as_ref().map(|e| &e.data);
        if !self.dirty_checker.is_dirty(previous, &data, &meta) {
            store.set_entry(key, skipped(existing, data)).await?;
            trace!(queue = %self.id, key, "skipping duplicate");
            self.emit(QueueEvent::Duplicate, Some(key), None);
            return Ok(PublishOutcome::Skipped);
        }

        store.set_entry(key, Entry::dirty(data)).await?;

        let admission = self.pending.lock().admit(key);
        match admission {
            Admission::Enqueued | Admission::AlreadyPending => {
                self.emit(QueueEvent::Enqueue, Some(key), None);
                Ok(PublishOutcome::Enqueued)
            }
            Admission::Deferred => {
                trace!(queue = %self.id, key, "key in flight; deferring");
                self.emit(QueueEvent::Enqueue, Some(key), None);
                Ok(PublishOutcome::Deferred)
            }
            Admission::Evicted(oldest) => {
                self.report_eviction(&oldest);
                self.emit(QueueEvent::Enqueue, Some(key), None);
                Ok(PublishOutcome::Enqueued)
            }
            Admission::Rejected => {
                let err = QueueError::QueueFull(self.id.clone());
                warn!(queue = %self.id, key, "pending set full; rejecting publish");
                self.emit(QueueEvent::Full, Some(key), Some(&err));
                Err(err)
            }
        }
    }

    fn report_eviction(&self, oldest: &str) {
        warn!(queue = %self.id, evicted = oldest, "pending set full; dropped oldest key");
        self.emit(QueueEvent::Full, Some(oldest), None);
    }

    /// Pops the oldest pending key and runs the consumer for it.
    ///
    /// The worker calls this once per interval; tests may drive it directly.
    pub async fn tick(&self) -> TickOutcome {
        let popped = self.pending.lock().pop();
        let Some((key, drained)) = popped else {
            return TickOutcome::Idle;
        };
        // Released on every exit, including cancellation of this future.
        let in_flight = InFlight { queue: self, key };
        if drained {
            self.emit(QueueEvent::Empty, None, None);
        }

        let outcome = self.consume(&in_flight.key).await;
        drop(in_flight);
        outcome
    }

    /// Clears the in-flight marker of `key` and enqueues a publish deferred
    /// while it ran.
    fn complete(&self, key: &str) {
        let resumed = self.pending.lock().complete(key);
        match resumed {
            Some(Admission::Evicted(oldest)) => self.report_eviction(&oldest),
            Some(Admission::Rejected) => {
                let err = QueueError::QueueFull(self.id.clone());
                warn!(queue = %self.id, key, "pending set full; deferred publish dropped");
                self.emit(QueueEvent::Full, Some(key), Some(&err));
            }
            Some(_) => trace!(queue = %self.id, key, "deferred publish enqueued"),
            None => {}
        }
    }

    async fn consume(&self, key: &str) -> TickOutcome {
        let store = self.store();

        let entry = match store.get_entry(key).await {
            Ok(Some(entry)) if entry.is_dirty => entry,
            Ok(_) => {
                self.emit(QueueEvent::Duplicate, Some(key), None);
                return TickOutcome::Stale;
            }
            Err(e) => {
                self.record_failure(key, e.into());
                return TickOutcome::Failed;
            }
        };

        let invocation = self.consumer.invoke(key.to_string(), entry.data.clone());
        let result = AssertUnwindSafe(invocation)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow!("consumer panicked")));

        match result {
            Ok(()) => {
                if let Err(e) = store.mark_entry_as_done(key, &entry).await {
                    warn!(queue = %self.id, key, error = %e, "failed to mark entry as done");
                }
                self.processed_count.fetch_add(1, Ordering::Relaxed);
                self.emit(QueueEvent::Consume, Some(key), None);
                TickOutcome::Consumed
            }
            Err(source) => {
                let err = QueueError::Consumer {
                    key: key.to_string(),
                    source,
                };
                self.record_failure(key, err);
                TickOutcome::Failed
            }
        }
    }

    fn record_failure(&self, key: &str, err: QueueError) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        debug!(queue = %self.id, key, error = %err, "consumption failed");
        self.emit(QueueEvent::Error, Some(key), Some(&err));
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queue_length: self.pending_len(),
            interval_ms: self.interval.as_millis() as u64,
            processed_count: self.processed_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
        }
    }

    /// Logs the current stats at INFO.
    pub fn print_stats(&self) {
        self.print_stats_at(Level::INFO);
    }

    /// Logs the current stats at `level`.
    pub fn print_stats_at(&self, level: Level) {
        let stats = self.stats();
        let id = self.id.as_str();
        match level {
            Level::ERROR => error!(queue = id, "{stats}"),
            Level::WARN => warn!(queue = id, "{stats}"),
            Level::INFO => info!(queue = id, "{stats}"),
            Level::DEBUG => debug!(queue = id, "{stats}"),
            _ => trace!(queue = id, "{stats}"),
        }
    }
}

/// Marks one popped key as being consumed until dropped.
struct InFlight<'a> {
    queue: &'a Queue,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.queue.complete(&self.key);
    }
}

/// Entry to persist after the checker rejected `data`.
///
/// A key seen for the first time keeps `data` as its clean baseline.
fn skipped(existing: Option<Entry>, data: Value) -> Entry {
    match existing {
        Some(mut entry) => {
            entry.skipped_count = entry.skipped_count.saturating_add(1);
            entry
        }
        None => Entry {
            data,
            is_dirty: false,
            time: current_timestamp(),
            skipped_count: 1,
        },
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("consumer", &self.consumer)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
