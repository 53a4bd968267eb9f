use super::{Datastore, Entry, ScanOrder};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory implementation of Datastore for tests and ephemeral nodes
#[derive(Debug, Default, Clone)]
pub struct MemoryDatastore {
    /// Ordered map of key -> value
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryDatastore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn scan(
        &self,
        first: &[u8],
        last: &[u8],
        order: ScanOrder,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        // BTreeMap::range panics on an inverted range.
        if first > last {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let matching = entries
            .range::<[u8], _>((Bound::Included(first), Bound::Included(last)))
            .map(|(key, value)| (key.clone(), value.clone()));

        let result = match order {
            ScanOrder::Ascending => matching.take(limit).collect(),
            ScanOrder::Descending => matching.rev().take(limit).collect(),
        };
        Ok(result)
    }
}
