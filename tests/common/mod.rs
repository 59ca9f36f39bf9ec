//! Shared test doubles for checkpoint store integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use drainer_checkpoint::{
    CheckpointBackend, CheckpointError, MemoryBackend, Position, Positions, Result, StoreSettings,
};

pub const CLUSTER_ID: u64 = 6_801_234_567_890;
pub const INITIAL_TS: i64 = 400_000_000_000;

pub fn settings() -> StoreSettings {
    StoreSettings {
        cluster_id: CLUSTER_ID,
        initial_commit_ts: INITIAL_TS,
        save_interval: Duration::from_secs(3),
    }
}

pub fn positions(entries: &[(&str, &str, i64)]) -> Positions {
    entries
        .iter()
        .map(|(node, suffix, offset)| (node.to_string(), Position::new(*suffix, *offset)))
        .collect()
}

/// Memory backend whose DDL, reads and writes can each be switched to fail
#[derive(Clone, Default)]
pub struct FlakyBackend {
    pub inner: Arc<MemoryBackend>,
    fail_schema: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    pub writes: Arc<AtomicUsize>,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_schema_failing(&self, failing: bool) {
        self.fail_schema.store(failing, Ordering::SeqCst);
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckpointBackend for FlakyBackend {
    async fn ensure_schema(&self) -> Result<()> {
        if self.fail_schema.load(Ordering::SeqCst) {
            return Err(CheckpointError::backend("cannot create checkpoint table"));
        }
        self.inner.ensure_schema().await
    }

    async fn fetch(&self, cluster_id: u64) -> Result<Vec<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CheckpointError::backend("backend unreachable"));
        }
        self.inner.fetch(cluster_id).await
    }

    async fn upsert(&self, cluster_id: u64, blob: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CheckpointError::backend("backend unavailable"));
        }
        self.inner.upsert(cluster_id, blob).await
    }
}

/// Backend whose writes block until released, recording the blobs written
#[derive(Clone, Default)]
pub struct GatedBackend {
    pub inner: Arc<MemoryBackend>,
    pub write_started: Arc<Notify>,
    pub release: Arc<Notify>,
    pub written: Arc<Mutex<Vec<String>>>,
}

impl GatedBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointBackend for GatedBackend {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch(&self, cluster_id: u64) -> Result<Vec<String>> {
        self.inner.fetch(cluster_id).await
    }

    async fn upsert(&self, cluster_id: u64, blob: &str) -> Result<()> {
        self.write_started.notify_one();
        self.release.notified().await;
        self.written.lock().push(blob.to_string());
        self.inner.upsert(cluster_id, blob).await
    }
}
