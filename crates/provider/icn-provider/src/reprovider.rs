//! Periodic re-announcement of locally held content.
//!
//! Router records expire, so every key a node holds has to be announced
//! again from time to time. The [`Reprovider`] walks a [`KeySource`] on a
//! fixed interval and whenever [`Reprovider::trigger`] is called.

use crate::error::ReproviderError;
use crate::provider::LifecycleState;
use crate::router::Router;
use async_trait::async_trait;
use icn_core_types::Cid;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before the first timed pass, so a node that is started and stopped
/// right away does not flood the router.
pub const INITIAL_REPROVIDE_DELAY: Duration = Duration::from_secs(60);

/// Supplies the full set of keys to re-announce on each pass.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn keys(&self) -> Result<Vec<Cid>, ReproviderError>;
}

/// A KeySource backed by an in-memory list
#[derive(Debug, Default)]
pub struct StaticKeySource {
    keys: RwLock<Vec<Cid>>,
}

impl StaticKeySource {
    pub fn new(keys: Vec<Cid>) -> Self {
        Self {
            keys: RwLock::new(keys),
        }
    }

    pub async fn add(&self, cid: Cid) {
        self.keys.write().await.push(cid);
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn keys(&self) -> Result<Vec<Cid>, ReproviderError> {
        Ok(self.keys.read().await.clone())
    }
}

type TriggerReply = oneshot::Sender<Result<usize, ReproviderError>>;

struct ReproviderLifecycle {
    state: LifecycleState,
    triggers: Option<mpsc::Receiver<TriggerReply>>,
    worker: Option<JoinHandle<()>>,
}

pub struct Reprovider {
    keys: Arc<dyn KeySource>,
    router: Arc<dyn Router>,
    interval: Duration,
    initial_delay: Duration,
    cancel: CancellationToken,
    trigger_tx: mpsc::Sender<TriggerReply>,
    lifecycle: Mutex<ReproviderLifecycle>,
}

impl Reprovider {
    /// Create a reprovider that runs a pass every `interval`. A zero interval
    /// disables timed passes; `trigger` still works.
    pub fn new(
        parent: &CancellationToken,
        keys: Arc<dyn KeySource>,
        router: Arc<dyn Router>,
        interval: Duration,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            keys,
            router,
            interval,
            initial_delay: INITIAL_REPROVIDE_DELAY,
            cancel: parent.child_token(),
            trigger_tx,
            lifecycle: Mutex::new(ReproviderLifecycle {
                state: LifecycleState::Created,
                triggers: Some(trigger_rx),
                worker: None,
            }),
        }
    }

    /// Override the delay before the first timed pass
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn state(&self) -> LifecycleState {
        let lifecycle = self.lifecycle.lock();
        lifecycle.state.observe(lifecycle.worker.as_ref())
    }

    pub fn run(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != LifecycleState::Created {
            warn!(state = ?lifecycle.state, "reprovider not startable, ignoring run()");
            return;
        }
        let Some(triggers) = lifecycle.triggers.take() else {
            return;
        };

        let task = ReproviderTask {
            keys: self.keys.clone(),
            router: self.router.clone(),
            interval: self.interval,
            initial_delay: self.initial_delay,
            cancel: self.cancel.clone(),
        };
        lifecycle.worker = Some(tokio::spawn(task.run(triggers)));
        lifecycle.state = LifecycleState::Running;
    }

    /// Run a pass now and wait for its result (the number of keys announced).
    pub async fn trigger(&self) -> Result<usize, ReproviderError> {
        match self.state() {
            LifecycleState::Created => return Err(ReproviderError::NotRunning),
            LifecycleState::Stopped | LifecycleState::Closed => return Err(ReproviderError::Closed),
            LifecycleState::Running => {}
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(ReproviderError::Closed),
            sent = self.trigger_tx.send(reply_tx) => sent.map_err(|_| ReproviderError::Closed)?,
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ReproviderError::Closed),
            reply = reply_rx => reply.map_err(|_| ReproviderError::Closed)?,
        }
    }

    /// Stop the reprovider, abandoning a pass in progress. Safe to call repeatedly.
    pub async fn close(&self) {
        let worker = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == LifecycleState::Closed {
                return;
            }
            lifecycle.state = LifecycleState::Closed;
            self.cancel.cancel();
            lifecycle.worker.take()
        };

        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!(error = %e, "reprovider task terminated abnormally");
            }
        }
    }
}

impl Drop for Reprovider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ReproviderTask {
    keys: Arc<dyn KeySource>,
    router: Arc<dyn Router>,
    interval: Duration,
    initial_delay: Duration,
    cancel: CancellationToken,
}

impl ReproviderTask {
    async fn run(self, mut triggers: mpsc::Receiver<TriggerReply>) {
        info!(interval_secs = self.interval.as_secs(), "reprovider started");

        let timed = !self.interval.is_zero();
        let mut next_pass = Instant::now() + self.initial_delay;

        loop {
            let reply = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                request = triggers.recv() => match request {
                    Some(reply) => Some(reply),
                    None => break,
                },
                _ = tokio::time::sleep_until(next_pass), if timed => None,
            };

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.reprovide() => result,
            };

            match reply {
                Some(reply) => {
                    let _ = reply.send(result);
                }
                None => match result {
                    Ok(count) => debug!(count, "reprovide pass complete"),
                    Err(e) => error!(error = %e, "failed to reprovide"),
                },
            }

            next_pass = Instant::now() + self.interval;
        }

        info!("reprovider stopped");
    }

    async fn reprovide(&self) -> Result<usize, ReproviderError> {
        let keys = self.keys.keys().await?;
        for cid in &keys {
            self.router
                .provide(cid, true)
                .await
                .map_err(|source| ReproviderError::Router { cid: *cid, source })?;
        }
        Ok(keys.len())
    }
}
