//! # Checkpoint Backends
//!
//! Storage for serialized checkpoint blobs, one logical row per cluster id.
//!
//! - [`postgres`] - SQLx backed table with upsert writes
//! - [`memory`] - versioned in-process rows, for tooling and tests

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

/// Row store behind a checkpoint store
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// Create the schema and table when missing
    async fn ensure_schema(&self) -> Result<()>;

    /// Every stored blob for `cluster_id`, in scan order
    async fn fetch(&self, cluster_id: u64) -> Result<Vec<String>>;

    /// Write `blob` as the current checkpoint of `cluster_id`
    async fn upsert(&self, cluster_id: u64, blob: &str) -> Result<()>;
}

#[async_trait]
impl<T: CheckpointBackend + ?Sized> CheckpointBackend for std::sync::Arc<T> {
    async fn ensure_schema(&self) -> Result<()> {
        (**self).ensure_schema().await
    }

    async fn fetch(&self, cluster_id: u64) -> Result<Vec<String>> {
        (**self).fetch(cluster_id).await
    }

    async fn upsert(&self, cluster_id: u64, blob: &str) -> Result<()> {
        (**self).upsert(cluster_id, blob).await
    }
}
