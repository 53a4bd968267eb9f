use crate::error::RouterError;
use prometheus::{IntCounter, IntCounterVec, Registry};

/// Counters for the announcement pipeline
#[derive(Clone)]
pub struct ProviderMetrics {
    /// Router calls by outcome (`ok`, `failed`, `timeout`)
    pub announcements: IntCounterVec,
    /// Jobs accepted by `provide`
    pub enqueued: IntCounter,
}

impl ProviderMetrics {
    /// Create new metrics and register them
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let announcements = IntCounterVec::new(
            prometheus::opts!("icn_provider_announcements_total", "CID announcements by outcome"),
            &["result"],
        )?;
        let enqueued = IntCounter::new("icn_provider_enqueued_total", "CIDs queued for announcement")?;

        registry.register(Box::new(announcements.clone()))?;
        registry.register(Box::new(enqueued.clone()))?;

        Ok(Self {
            announcements,
            enqueued,
        })
    }

    pub fn record_enqueued(&self) {
        self.enqueued.inc();
    }

    pub fn record_announced(&self) {
        self.announcements.with_label_values(&["ok"]).inc();
    }

    pub fn record_failure(&self, error: &RouterError) {
        let result = match error {
            RouterError::Timeout(_) => "timeout",
            RouterError::Failed(_) => "failed",
        };
        self.announcements.with_label_values(&[result]).inc();
    }

    pub fn announced(&self, result: &str) -> u64 {
        self.announcements.with_label_values(&[result]).get()
    }
}
