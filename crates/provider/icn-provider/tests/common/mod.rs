#![allow(dead_code)]

use async_trait::async_trait;
use icn_provider::{Cid, Router, RouterError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_cids(count: usize) -> Vec<Cid> {
    (0..count)
        .map(|i| Cid::for_block(format!("test-block-{}", i).as_bytes()).unwrap())
        .collect()
}

/// Router that hands every announced CID to a channel, blocking while the
/// channel is full.
pub struct MockRouter {
    provided: mpsc::Sender<Cid>,
    calls: AtomicUsize,
}

impl MockRouter {
    pub fn new() -> (Self, mpsc::Receiver<Cid>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                provided: tx,
                calls: AtomicUsize::new(0),
            },
            rx,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Router for MockRouter {
    async fn provide(&self, cid: &Cid, recursive: bool) -> Result<(), RouterError> {
        assert!(recursive, "provider must announce recursively");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.provided
            .send(*cid)
            .await
            .map_err(|_| RouterError::Failed("receiver dropped".into()))
    }
}

/// Router that fails for a fixed set of CIDs and hangs forever on another,
/// recording everything else.
pub struct ScriptedRouter {
    failing: HashSet<Cid>,
    hanging: HashSet<Cid>,
    provided: Mutex<Vec<Cid>>,
    attempts: AtomicUsize,
}

impl ScriptedRouter {
    pub fn new(failing: impl IntoIterator<Item = Cid>, hanging: impl IntoIterator<Item = Cid>) -> Self {
        Self {
            failing: failing.into_iter().collect(),
            hanging: hanging.into_iter().collect(),
            provided: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn provided(&self) -> Vec<Cid> {
        self.provided.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Router for ScriptedRouter {
    async fn provide(&self, cid: &Cid, _recursive: bool) -> Result<(), RouterError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hanging.contains(cid) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(cid) {
            return Err(RouterError::Failed(format!("no route for {}", cid)));
        }
        self.provided.lock().unwrap().push(*cid);
        Ok(())
    }
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
