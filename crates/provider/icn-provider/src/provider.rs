//! Single-flight announcement worker.
//!
//! A [`Provider`] owns one background task that drains an
//! [`AnnouncementQueue`] into a [`Router`]. Producers call
//! [`Provider::provide`] from any task; the worker announces strictly in
//! queue order, one CID at a time.

use crate::error::{ProviderError, RouterError};
#[cfg(feature = "metrics")]
use crate::metrics::ProviderMetrics;
use crate::queue::AnnouncementQueue;
use crate::router::Router;
use icn_core_types::Cid;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of a provider or reprovider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    /// The background task exited without `close`, after the parent token
    /// was cancelled or on a store failure. Only `close` is left to do.
    Stopped,
    Closed,
}

impl LifecycleState {
    /// Effective state given the background task handle, if one was spawned.
    pub(crate) fn observe(self, worker: Option<&JoinHandle<()>>) -> Self {
        match (self, worker) {
            (LifecycleState::Running, Some(handle)) if handle.is_finished() => LifecycleState::Stopped,
            (state, _) => state,
        }
    }
}

struct Lifecycle {
    state: LifecycleState,
    worker: Option<JoinHandle<()>>,
}

pub struct Provider {
    queue: Arc<AnnouncementQueue>,
    router: Arc<dyn Router>,
    timeout: Option<Duration>,
    /// Root token of this provider, a child of the token passed to `new`.
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    #[cfg(feature = "metrics")]
    metrics: Option<ProviderMetrics>,
}

impl Provider {
    /// Create a provider over `queue`. The worker is not started until [`run`](Self::run).
    ///
    /// Cancelling `parent` stops the worker just like [`close`](Self::close)
    /// would, but leaves `provide` usable.
    pub fn new(parent: &CancellationToken, queue: Arc<AnnouncementQueue>, router: Arc<dyn Router>) -> Self {
        Self {
            queue,
            router,
            timeout: None,
            cancel: parent.child_token(),
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::Created,
                worker: None,
            }),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Bound every router call by `timeout`. A zero duration leaves calls unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: ProviderMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn state(&self) -> LifecycleState {
        let lifecycle = self.lifecycle.lock();
        lifecycle.state.observe(lifecycle.worker.as_ref())
    }

    pub fn queue(&self) -> &Arc<AnnouncementQueue> {
        &self.queue
    }

    /// Start the announcement worker.
    ///
    /// Calling this on a running or closed provider logs a warning and does nothing.
    pub fn run(&self) {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            LifecycleState::Created => {}
            LifecycleState::Running | LifecycleState::Stopped => {
                warn!("provider already started, ignoring run()");
                return;
            }
            LifecycleState::Closed => {
                warn!("provider is closed, ignoring run()");
                return;
            }
        }

        let worker = Worker {
            queue: self.queue.clone(),
            router: self.router.clone(),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
            #[cfg(feature = "metrics")]
            metrics: self.metrics.clone(),
        };
        lifecycle.worker = Some(tokio::spawn(worker.run()));
        lifecycle.state = LifecycleState::Running;
    }

    /// Queue `cid` for announcement. Valid before and after `run`, fails once closed.
    pub async fn provide(&self, cid: &Cid) -> Result<(), ProviderError> {
        if self.state() == LifecycleState::Closed {
            return Err(ProviderError::Closed);
        }

        self.queue.enqueue(cid).await?;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_enqueued();
        }
        Ok(())
    }

    /// Stop the worker without draining the queue.
    ///
    /// Jobs still queued stay in the store for a later provider opened over
    /// it. An in-flight announcement is dropped. Once this returns the router
    /// sees no further calls from this provider. Safe to call repeatedly.
    pub async fn close(&self) {
        let worker = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == LifecycleState::Closed {
                return;
            }
            lifecycle.state = LifecycleState::Closed;
            self.cancel.cancel();
            self.queue.close();
            lifecycle.worker.take()
        };

        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!(error = %e, "announcement worker terminated abnormally");
            }
        }
        debug!("provider closed");
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    queue: Arc<AnnouncementQueue>,
    router: Arc<dyn Router>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    #[cfg(feature = "metrics")]
    metrics: Option<ProviderMetrics>,
}

impl Worker {
    async fn run(self) {
        info!(namespace = %self.queue.namespace(), timeout = ?self.timeout, "announcement worker started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let cid = match self.queue.dequeue(&self.cancel).await {
                Ok(Some(cid)) => cid,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "failed to read announcement queue, stopping worker");
                    break;
                }
            };

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(%cid, "announcement abandoned on shutdown");
                    break;
                }
                result = self.announce(&cid) => result,
            };

            match &result {
                Ok(()) => debug!(%cid, "announced"),
                Err(e) => warn!(%cid, error = %e, "failed to announce CID"),
            }
            self.record_outcome(&result);
        }

        info!(namespace = %self.queue.namespace(), "announcement worker stopped");
    }

    fn record_outcome(&self, result: &Result<(), RouterError>) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            match result {
                Ok(()) => metrics.record_announced(),
                Err(e) => metrics.record_failure(e),
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = result;
    }

    async fn announce(&self, cid: &Cid) -> Result<(), RouterError> {
        let call = self.router.provide(cid, true);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RouterError::Timeout(limit))?,
            None => call.await,
        }
    }
}
