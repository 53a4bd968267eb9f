//! Durable FIFO of pending CID announcements.
//!
//! Jobs are stored under `/<namespace>/<sequence>` where the sequence is a
//! 20-digit zero-padded decimal, so a bytewise range scan of the store yields
//! FIFO order. The scan is bounded to the all-digit keys of the namespace;
//! a nested namespace such as `a/b` sorts outside the range of `a`. Any number
//! of tasks may enqueue; one consumer dequeues.
//!
//! Dequeue commits immediately: the entry is deleted from the store before
//! the CID is handed back, so a job is redelivered only if the process dies
//! before that delete reaches disk.

use crate::datastore::{Datastore, ScanOrder};
use crate::error::QueueError;
use icn_core_types::Cid;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Width of the decimal sequence in a queue key (fits `u64::MAX`).
const SEQUENCE_WIDTH: usize = 20;

pub struct AnnouncementQueue {
    namespace: String,
    prefix: Vec<u8>,
    /// Inclusive bounds of this queue's key space.
    first_key: Vec<u8>,
    last_key: Vec<u8>,
    store: Arc<dyn Datastore>,
    /// Next sequence to assign. Held across the store write so concurrent
    /// enqueues persist in sequence order.
    next_sequence: Mutex<u64>,
    /// Serializes consumers so an entry is never handed out twice.
    head: Mutex<()>,
    /// Signalled after every successful enqueue.
    pending: Notify,
    closed: CancellationToken,
}

impl AnnouncementQueue {
    /// Open the queue stored under `namespace`, resuming after the highest persisted sequence.
    pub async fn open(namespace: &str, store: Arc<dyn Datastore>) -> Result<Self, QueueError> {
        let namespace = namespace.trim_matches('/').to_string();
        let prefix = format!("/{}/", namespace).into_bytes();
        let first_key = bound_key(&prefix, b'0');
        let last_key = bound_key(&prefix, b'9');

        let last = store.scan(&first_key, &last_key, ScanOrder::Descending, 1).await?;
        let next_sequence = match last.first() {
            Some((key, _)) => parse_sequence(&prefix, key)?
                .checked_add(1)
                .ok_or(QueueError::SequenceExhausted)?,
            None => 0,
        };

        debug!(namespace = %namespace, next_sequence, "opened announcement queue");

        Ok(Self {
            namespace,
            prefix,
            first_key,
            last_key,
            store,
            next_sequence: Mutex::new(next_sequence),
            head: Mutex::new(()),
            pending: Notify::new(),
            closed: CancellationToken::new(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Persist `cid` as the next job and wake the consumer. Returns the assigned sequence.
    pub async fn enqueue(&self, cid: &Cid) -> Result<u64, QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let mut next = self.next_sequence.lock().await;
        let sequence = *next;
        // u64::MAX is never assigned, so a reopened queue can always resume.
        let following = sequence.checked_add(1).ok_or(QueueError::SequenceExhausted)?;
        self.store.put(&self.key_for(sequence), &cid.to_bytes()).await?;
        *next = following;
        drop(next);

        self.pending.notify_one();
        debug!(%cid, sequence, "queued announcement");
        Ok(sequence)
    }

    /// Wait for the oldest job and remove it from the store.
    ///
    /// Returns `Ok(None)` as soon as `cancel` fires or the queue is closed,
    /// including when either already happened and jobs are still pending.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<Cid>, QueueError> {
        let _head = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            _ = self.closed.cancelled() => return Ok(None),
            guard = self.head.lock() => guard,
        };

        loop {
            if cancel.is_cancelled() || self.closed.is_cancelled() {
                return Ok(None);
            }

            let oldest = self
                .store
                .scan(&self.first_key, &self.last_key, ScanOrder::Ascending, 1)
                .await?;
            if let Some((key, value)) = oldest.into_iter().next() {
                self.store.delete(&key).await?;
                match Cid::decode(&value) {
                    Ok(cid) => return Ok(Some(cid)),
                    Err(e) => {
                        warn!(
                            key = %String::from_utf8_lossy(&key),
                            error = %e,
                            "dropping undecodable announcement entry"
                        );
                        continue;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                _ = self.closed.cancelled() => return Ok(None),
                _ = self.pending.notified() => {}
            }
        }
    }

    /// Stop the queue. Blocked and future `dequeue` calls return `Ok(None)`,
    /// `enqueue` fails with `Closed`. Persisted jobs stay in the store.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!(namespace = %self.namespace, "closing announcement queue");
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of jobs currently persisted.
    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.store.count(&self.first_key, &self.last_key).await?)
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    fn key_for(&self, sequence: u64) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(format!("{:0width$}", sequence, width = SEQUENCE_WIDTH).as_bytes());
        key
    }
}

/// `prefix` followed by `SEQUENCE_WIDTH` copies of `digit`.
fn bound_key(prefix: &[u8], digit: u8) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.resize(prefix.len() + SEQUENCE_WIDTH, digit);
    key
}

fn parse_sequence(prefix: &[u8], key: &[u8]) -> Result<u64, QueueError> {
    key.strip_prefix(prefix)
        .and_then(|suffix| std::str::from_utf8(suffix).ok())
        .and_then(|digits| digits.parse::<u64>().ok())
        .ok_or_else(|| QueueError::MalformedKey(String::from_utf8_lossy(key).into_owned()))
}
