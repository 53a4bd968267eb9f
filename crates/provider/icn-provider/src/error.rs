use icn_core_types::Cid;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`Datastore`](crate::datastore::Datastore) backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Join error from background task: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by the announcement queue
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Malformed queue key: {0}")]
    MalformedKey(String),
    #[error("Queue sequence numbers exhausted")]
    SequenceExhausted,
    #[error("Announcement queue is closed")]
    Closed,
}

/// Errors returned by a [`Router`](crate::router::Router) announcement
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Announcement timed out after {0:?}")]
    Timeout(Duration),
    #[error("Routing failed: {0}")]
    Failed(String),
}

/// Errors surfaced to callers of [`Provider::provide`](crate::provider::Provider::provide)
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to queue announcement: {0}")]
    Queue(QueueError),
    #[error("Provider is closed")]
    Closed,
}

impl From<QueueError> for ProviderError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Closed => ProviderError::Closed,
            other => ProviderError::Queue(other),
        }
    }
}

/// Errors produced by a reprovide pass
#[derive(Error, Debug)]
pub enum ReproviderError {
    #[error("Failed to list keys to reprovide: {0}")]
    KeySource(String),
    #[error("Failed to reprovide {cid}: {source}")]
    Router {
        cid: Cid,
        #[source]
        source: RouterError,
    },
    #[error("Reprovider is not running")]
    NotRunning,
    #[error("Reprovider is closed")]
    Closed,
}
