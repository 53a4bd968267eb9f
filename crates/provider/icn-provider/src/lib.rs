//! CID announcement pipeline for ICN nodes.
//!
//! New content is queued durably with [`Provider::provide`] and announced to
//! the routing layer by a single background worker; content already held is
//! re-announced periodically by the [`Reprovider`].

pub mod datastore;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod provider;
pub mod queue;
pub mod reprovider;
pub mod router;
pub mod system;

pub use datastore::{Datastore, MemoryDatastore, ScanOrder, SledDatastore};
pub use error::{ProviderError, QueueError, ReproviderError, RouterError, StoreError};
#[cfg(feature = "metrics")]
pub use metrics::ProviderMetrics;
pub use provider::{LifecycleState, Provider};
pub use queue::AnnouncementQueue;
pub use reprovider::{KeySource, Reprovider, StaticKeySource, INITIAL_REPROVIDE_DELAY};
pub use router::Router;
pub use system::ProvideSystem;

pub use icn_core_types::Cid;
