use crate::error::RouterError;
use async_trait::async_trait;
use icn_core_types::Cid;

/// The routing layer (e.g. a DHT) that records which peer holds which CID.
///
/// Cancellation is expressed by dropping the returned future: the provider
/// drops an in-flight announcement when it shuts down or when the configured
/// timeout expires. Implementations must not call back into the provider.
#[async_trait]
pub trait Router: Send + Sync {
    /// Announce that this node holds `cid`. With `recursive` set the
    /// announcement covers everything reachable from `cid`.
    async fn provide(&self, cid: &Cid, recursive: bool) -> Result<(), RouterError>;
}
