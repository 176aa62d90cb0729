use std::fmt;
use std::time::Duration;

use crate::core::consumer::Consumer;
use crate::core::dirty::SharedChecker;
use crate::core::error::QueueError;
use crate::core::queue::pending::OverflowPolicy;
use crate::core::store::StoreFactory;

/// Tick period used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Everything needed to start one queue.
///
/// ```no_run
/// # use std::time::Duration;
/// # use queuep::{Consumer, QueueOptions};
/// let options = QueueOptions::new()
///     .interval(Duration::from_millis(50))
///     .consumer(Consumer::from_async(|key, data| async move {
///         println!("{key}: {data}");
///         Ok(())
///     }));
/// ```
#[derive(Clone)]
pub struct QueueOptions {
    pub(crate) interval: Duration,
    pub(crate) dirty_checker: Option<SharedChecker>,
    pub(crate) consumer: Option<Consumer>,
    pub(crate) store_factory: Option<StoreFactory>,
    pub(crate) capacity: Option<usize>,
    pub(crate) overflow_policy: OverflowPolicy,
}

impl QueueOptions {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            dirty_checker: None,
            consumer: None,
            store_factory: None,
            capacity: None,
            overflow_policy: OverflowPolicy::default(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval_ms(self, ms: u64) -> Self {
        self.interval(Duration::from_millis(ms))
    }

    /// Defaults to the naive checker.
    pub fn dirty_checker(mut self, checker: SharedChecker) -> Self {
        self.dirty_checker = Some(checker);
        self
    }

    pub fn consumer(mut self, consumer: Consumer) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Defaults to the registry's current store factory.
    pub fn store_factory(mut self, factory: StoreFactory) -> Self {
        self.store_factory = Some(factory);
        self
    }

    /// Bound on pending keys; unbounded when unset.
    pub fn capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), QueueError> {
        if self.interval.is_zero() {
            return Err(QueueError::config("interval must be greater than zero"));
        }
        if self.consumer.is_none() {
            return Err(QueueError::config("a consumer is required"));
        }
        if self.capacity == Some(0) {
            return Err(QueueError::config("capacity must be at least 1"));
        }
        Ok(())
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueueOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueOptions")
            .field("interval", &self.interval)
            .field("dirty_checker", &self.dirty_checker.is_some())
            .field("consumer", &self.consumer)
            .field("store_factory", &self.store_factory.is_some())
            .field("capacity", &self.capacity)
            .field("overflow_policy", &self.overflow_policy)
            .finish()
    }
}
