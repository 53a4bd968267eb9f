use super::{Datastore, Entry, ScanOrder};
use crate::error::StoreError;
use async_trait::async_trait;
use std::path::Path;

/// Tree holding queue entries inside the sled database.
const TREE_PROVIDER: &str = "provider";

/// sled implementation of Datastore.
///
/// `put` flushes before returning, so an acknowledged write survives a crash.
/// Deletes ride on sled's background flush; a crash right after a delete can
/// resurrect the entry.
#[derive(Clone)]
pub struct SledDatastore {
    tree: ::sled::Tree,
}

impl SledDatastore {
    /// Open (or create) a sled database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = ::sled::open(path)?;
        let tree = db.open_tree(TREE_PROVIDER)?;
        Ok(Self { tree })
    }

    /// Flush all pending writes, including deletes, to disk.
    pub async fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.tree.flush_async().await?)
    }
}

#[async_trait]
impl Datastore for SledDatastore {
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let tree = self.tree.clone();
        let key = key.to_vec();
        let value = value.to_vec();

        tokio::task::spawn_blocking(move || {
            tree.insert(key, value)?;
            Ok::<_, StoreError>(())
        })
        .await??;

        self.tree.flush_async().await?;
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let tree = self.tree.clone();
        let key = key.to_vec();

        tokio::task::spawn_blocking(move || {
            tree.remove(key)?;
            Ok::<_, StoreError>(())
        })
        .await?
    }

    async fn scan(
        &self,
        first: &[u8],
        last: &[u8],
        order: ScanOrder,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        if first > last {
            return Ok(Vec::new());
        }
        let tree = self.tree.clone();
        let (first, last) = (first.to_vec(), last.to_vec());

        tokio::task::spawn_blocking(move || {
            let iter = tree.range(first..=last);
            let iter: Box<dyn Iterator<Item = ::sled::Result<(::sled::IVec, ::sled::IVec)>>> = match order {
                ScanOrder::Ascending => Box::new(iter),
                ScanOrder::Descending => Box::new(iter.rev()),
            };

            let mut result = Vec::new();
            for item in iter.take(limit) {
                let (key, value) = item?;
                result.push((key.to_vec(), value.to_vec()));
            }
            Ok::<_, StoreError>(result)
        })
        .await?
    }

    async fn count(&self, first: &[u8], last: &[u8]) -> Result<usize, StoreError> {
        if first > last {
            return Ok(0);
        }
        let tree = self.tree.clone();
        let (first, last) = (first.to_vec(), last.to_vec());

        tokio::task::spawn_blocking(move || {
            let mut count = 0;
            for item in tree.range(first..=last).keys() {
                item?;
                count += 1;
            }
            Ok::<_, StoreError>(count)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q_FIRST: &[u8] = b"/q/00000000000000000000";
    const Q_LAST: &[u8] = b"/q/99999999999999999999";

    #[tokio::test]
    async fn test_sled_scan_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledDatastore::open(dir.path()).unwrap();

        for key in ["/q/00000000000000000002", "/q/00000000000000000000", "/q/00000000000000000001", "/r/0"] {
            store.put(key.as_bytes(), b"v").await.unwrap();
        }

        let asc = store.scan(Q_FIRST, Q_LAST, ScanOrder::Ascending, 1).await.unwrap();
        assert_eq!(asc[0].0, b"/q/00000000000000000000".to_vec());

        let desc = store.scan(Q_FIRST, Q_LAST, ScanOrder::Descending, 1).await.unwrap();
        assert_eq!(desc[0].0, b"/q/00000000000000000002".to_vec());

        store.delete(b"/q/00000000000000000000").await.unwrap();
        assert_eq!(store.count(Q_FIRST, Q_LAST).await.unwrap(), 2);
        assert_eq!(store.count(b"/r/0", b"/r/9").await.unwrap(), 1);
        assert_eq!(store.count(Q_LAST, Q_FIRST).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sled_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledDatastore::open(dir.path()).unwrap();
            store.put(b"/q/1", b"one").await.unwrap();
            store.put(b"/q/2", b"two").await.unwrap();
            store.delete(b"/q/1").await.unwrap();
            store.flush().await.unwrap();
        }

        let store = SledDatastore::open(dir.path()).unwrap();
        let entries = store.scan(b"/q/0", b"/q/9", ScanOrder::Ascending, usize::MAX).await.unwrap();
        assert_eq!(entries, vec![(b"/q/2".to_vec(), b"two".to_vec())]);
    }
}
