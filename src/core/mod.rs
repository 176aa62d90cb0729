pub mod consumer;
pub mod dirty;
pub mod entry;
pub mod error;
pub mod event;
pub mod handle;
pub mod queue;
pub mod registry;
pub mod store;
