//! Consumer calling conventions.
//!
//! The convention is picked explicitly when the consumer is registered:
//! - [`Consumer::from_async`]: the consumer returns a future resolving to
//!   `anyhow::Result<()>`.
//! - [`Consumer::from_callback`]: the consumer receives a [`Completion`] and
//!   reports the outcome through it, error first.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

type AsyncFn = dyn Fn(String, Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;
type CallbackFn = dyn Fn(String, Value, Completion) + Send + Sync;

#[derive(Clone)]
pub enum Consumer {
    Async(Arc<AsyncFn>),
    Callback(Arc<CallbackFn>),
}

impl Consumer {
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Consumer::Async(Arc::new(
            move |key: String, data: Value| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(f(key, data))
            },
        ))
    }

    pub fn from_callback<F>(f: F) -> Self
    where
        F: Fn(String, Value, Completion) + Send + Sync + 'static,
    {
        Consumer::Callback(Arc::new(f))
    }

    /// Runs the consumer for one key and waits for its outcome.
    pub async fn invoke(&self, key: String, data: Value) -> anyhow::Result<()> {
        match self {
            Consumer::Async(f) => f(key, data).await,
            Consumer::Callback(f) => {
                let (completion, rx) = Completion::new();
                f(key, data, completion);
                rx.await
                    .unwrap_or_else(|_| Err(anyhow!("consumer dropped its completion callback")))
            }
        }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consumer::Async(_) => f.write_str("Consumer::Async"),
            Consumer::Callback(_) => f.write_str("Consumer::Callback"),
        }
    }
}

/// Error-first completion handed to callback consumers. Call it once.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<anyhow::Result<()>>,
}

impl Completion {
    fn new() -> (Self, oneshot::Receiver<anyhow::Result<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// `None` for success, `Some(err)` for failure.
    pub fn done(self, err: Option<anyhow::Error>) {
        let _ = self.tx.send(err.map_or(Ok(()), Err));
    }

    pub fn succeed(self) {
        self.done(None);
    }

    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.done(Some(err.into()));
    }
}
