//! Dirty checkers decide whether a newly published value is materially
//! different from the one currently stored for its key.
//!
//! Checkers are pure and synchronous. They receive the stored value (if any),
//! the candidate value and the stored entry's [`EntryMeta`].
//!
//! Strategies:
//! - [`NaiveChecker`]       – structural inequality
//! - [`FieldChecker`]       – inequality over a field whitelist
//! - [`ExpirationChecker`]  – forced flush after a randomized age threshold
//! - [`SkippedCountChecker`] – forced flush after a randomized skip count
//! - [`AnyOf`] / [`AllOf`]  – OR / AND composition, no short-circuiting

pub mod checkers;
pub mod definition;

pub use checkers::{ExpirationChecker, FieldChecker, NaiveChecker, SkippedCountChecker, TimeUnit};
pub use definition::DirtyCheckerConfig;

use std::sync::Arc;

use serde_json::Value;

use crate::core::entry::EntryMeta;
use crate::core::error::QueueError;

/// Predicate deciding whether `next` must be enqueued for consumption.
pub trait DirtyChecker: Send + Sync {
    fn is_dirty(&self, previous: Option<&Value>, next: &Value, meta: &EntryMeta) -> bool;
}

impl<F> DirtyChecker for F
where
    F: Fn(Option<&Value>, &Value, &EntryMeta) -> bool + Send + Sync,
{
    fn is_dirty(&self, previous: Option<&Value>, next: &Value, meta: &EntryMeta) -> bool {
        self(previous, next, meta)
    }
}

/// Shared, type-erased checker as held by a queue.
pub type SharedChecker = Arc<dyn DirtyChecker>;

/// Dirty if any inner checker says so. Every checker runs on every call.
pub struct AnyOf {
    checkers: Vec<SharedChecker>,
}

/// Dirty only if all inner checkers agree. Every checker runs on every call.
pub struct AllOf {
    checkers: Vec<SharedChecker>,
}

impl AnyOf {
    pub fn new(checkers: Vec<SharedChecker>) -> Result<Self, QueueError> {
        if checkers.is_empty() {
            return Err(QueueError::config("combine requires at least one checker"));
        }
        Ok(Self { checkers })
    }
}

impl AllOf {
    pub fn new(checkers: Vec<SharedChecker>) -> Result<Self, QueueError> {
        if checkers.is_empty() {
            return Err(QueueError::config(
                "combine_strict requires at least one checker",
            ));
        }
        Ok(Self { checkers })
    }
}

impl DirtyChecker for AnyOf {
    fn is_dirty(&self, previous: Option<&Value>, next: &Value, meta: &EntryMeta) -> bool {
        self.checkers
            .iter()
            .fold(false, |dirty, c| c.is_dirty(previous, next, meta) | dirty)
    }
}

impl DirtyChecker for AllOf {
    fn is_dirty(&self, previous: Option<&Value>, next: &Value, meta: &EntryMeta) -> bool {
        self.checkers
            .iter()
            .fold(true, |dirty, c| c.is_dirty(previous, next, meta) & dirty)
    }
}

/// Default checker used when a queue is configured without one.
pub fn naive() -> SharedChecker {
    Arc::new(NaiveChecker)
}

pub fn field_based<I, S>(fields: I) -> Result<SharedChecker, QueueError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Ok(Arc::new(FieldChecker::new(fields)?))
}

pub fn combine(checkers: Vec<SharedChecker>) -> Result<SharedChecker, QueueError> {
    Ok(Arc::new(AnyOf::new(checkers)?))
}

pub fn combine_strict(checkers: Vec<SharedChecker>) -> Result<SharedChecker, QueueError> {
    Ok(Arc::new(AllOf::new(checkers)?))
}
