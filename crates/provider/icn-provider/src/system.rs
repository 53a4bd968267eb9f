use crate::datastore::SledDatastore;
use crate::error::{ProviderError, ReproviderError};
use crate::provider::Provider;
use crate::queue::AnnouncementQueue;
use crate::reprovider::{KeySource, Reprovider};
use crate::router::Router;
use anyhow::Context;
use icn_config::AnnouncerConfig;
use icn_core_types::Cid;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The complete announcement pipeline: a queue-backed [`Provider`] for new
/// content and a [`Reprovider`] for content already held.
pub struct ProvideSystem {
    provider: Provider,
    reprovider: Reprovider,
}

impl ProvideSystem {
    pub fn new(provider: Provider, reprovider: Reprovider) -> Self {
        Self { provider, reprovider }
    }

    /// Build the pipeline from config: sled store, queue namespace, announce timeout
    /// and reprovide interval. Nothing is started until [`run`](Self::run).
    pub async fn open(
        config: &AnnouncerConfig,
        parent: &CancellationToken,
        router: Arc<dyn Router>,
        keys: Arc<dyn KeySource>,
    ) -> anyhow::Result<Self> {
        let store = SledDatastore::open(&config.store.path)
            .with_context(|| format!("Failed to open provider store at {}", config.store.path.display()))?;
        let queue = AnnouncementQueue::open(&config.queue.namespace, Arc::new(store))
            .await
            .with_context(|| format!("Failed to open announcement queue {}", config.queue.namespace))?;

        let pending = queue.len().await.context("Failed to count queued announcements")?;
        info!(
            path = %config.store.path.display(),
            namespace = %config.queue.namespace,
            pending,
            "opened provide system"
        );

        let mut provider = Provider::new(parent, Arc::new(queue), router.clone());
        if let Some(timeout) = config.provider.announce_timeout() {
            provider = provider.with_timeout(timeout);
        }
        let reprovider = Reprovider::new(parent, keys, router, config.reprovider.interval());

        Ok(Self::new(provider, reprovider))
    }

    pub fn run(&self) {
        self.provider.run();
        self.reprovider.run();
    }

    pub async fn close(&self) {
        self.provider.close().await;
        self.reprovider.close().await;
    }

    /// Queue `cid` for announcement
    pub async fn provide(&self, cid: &Cid) -> Result<(), ProviderError> {
        self.provider.provide(cid).await
    }

    /// Re-announce every key of the key source now
    pub async fn reprovide(&self) -> Result<usize, ReproviderError> {
        self.reprovider.trigger().await
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn reprovider(&self) -> &Reprovider {
        &self.reprovider
    }
}
