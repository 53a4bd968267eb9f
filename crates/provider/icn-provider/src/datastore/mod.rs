use crate::error::StoreError;
use async_trait::async_trait;

mod memory;
pub mod sled;

pub use self::memory::MemoryDatastore;
pub use self::sled::SledDatastore;

/// A key/value pair returned by [`Datastore::scan`].
pub type Entry = (Vec<u8>, Vec<u8>);

/// Direction of a range scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Ascending,
    Descending,
}

/// Ordered key-value store underneath the announcement queue.
///
/// Keys compare bytewise. Implementations serialize concurrent writers
/// themselves; callers never lock around them.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Write `value` under `key`. Once this returns `Ok` the write must survive a restart
    /// for backends that claim durability.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Return at most `limit` entries with `first <= key <= last`, in key order.
    /// An inverted range is empty.
    async fn scan(&self, first: &[u8], last: &[u8], order: ScanOrder, limit: usize)
        -> Result<Vec<Entry>, StoreError>;

    /// Count the entries with `first <= key <= last`
    async fn count(&self, first: &[u8], last: &[u8]) -> Result<usize, StoreError> {
        Ok(self.scan(first, last, ScanOrder::Ascending, usize::MAX).await?.len())
    }
}
