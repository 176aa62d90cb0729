use thiserror::Error;

/// Errors surfaced by queue setup, lookups and the publish path.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Invalid dirty-checker arguments, missing consumer, zero interval.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("queue `{0}` does not exist; has it been initialized?")]
    UnknownQueue(String),

    #[error("queue `{0}` is already initialized; remove it first")]
    AlreadyInitialized(String),

    #[error("consumer failed for key `{key}`: {source}")]
    Consumer {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("queue `{0}` is full")]
    QueueFull(String),
}

impl QueueError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        QueueError::Configuration(msg.into())
    }
}

/// Failures reported by a [`Store`](crate::core::store::Store) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}
