use async_trait::async_trait;
use parking_lot::Mutex;

use super::CheckpointBackend;
use crate::error::Result;

/// Append-only row log
///
/// Every upsert appends a new version, like a merge-tree table that has not
/// been compacted, so reads may see several rows for one cluster id. They are
/// returned oldest first.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: Mutex<Vec<(u64, String)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row verbatim, bypassing the store's encoding
    pub fn insert_raw(&self, cluster_id: u64, blob: impl Into<String>) {
        self.rows.lock().push((cluster_id, blob.into()));
    }

    pub fn row_count(&self, cluster_id: u64) -> usize {
        self.rows
            .lock()
            .iter()
            .filter(|(id, _)| *id == cluster_id)
            .count()
    }

    /// Newest blob for `cluster_id`
    pub fn latest(&self, cluster_id: u64) -> Option<String> {
        self.rows
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| *id == cluster_id)
            .map(|(_, blob)| blob.clone())
    }
}

#[async_trait]
impl CheckpointBackend for MemoryBackend {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch(&self, cluster_id: u64) -> Result<Vec<String>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|(id, _)| *id == cluster_id)
            .map(|(_, blob)| blob.clone())
            .collect())
    }

    async fn upsert(&self, cluster_id: u64, blob: &str) -> Result<()> {
        self.insert_raw(cluster_id, blob);
        Ok(())
    }
}
