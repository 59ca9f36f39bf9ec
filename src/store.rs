//! # Checkpoint Store
//!
//! Owns the last persisted checkpoint of one cluster, throttles saves and
//! performs the load/save round trip against a [`CheckpointBackend`].
//!
//! All in-memory state sits behind one async reader/writer lock. `load` and
//! `save` hold the write guard across the backend round trip, so backend
//! writes for a cluster never overlap and readers observe either the whole
//! state before a save or the whole state after it. `check` and `pos` only
//! take the read guard and never touch the backend.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::backend::{CheckpointBackend, PostgresBackend};
use crate::checkpoint::{CheckPoint, Checkpoint};
use crate::config::CheckpointConfig;
use crate::error::Result;
use crate::logging::log_checkpoint_operation;
use crate::position::{apply_safety_margin, Positions};
use crate::safe_point::{PoppedSafePoint, SafePointSource};

/// Per-instance settings of a [`CheckpointStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub cluster_id: u64,
    pub initial_commit_ts: i64,
    pub save_interval: Duration,
}

impl From<&CheckpointConfig> for StoreSettings {
    fn from(config: &CheckpointConfig) -> Self {
        Self {
            cluster_id: config.cluster_id,
            initial_commit_ts: config.initial_commit_ts,
            save_interval: config.save_interval(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    commit_ts: i64,
    positions: Positions,
    /// Start of the last save attempt; unset until the first one
    save_time: Option<Instant>,
}

/// Checkpoint store for one cluster id
pub struct CheckpointStore<B> {
    backend: B,
    safe_points: Arc<dyn SafePointSource>,
    settings: StoreSettings,
    state: RwLock<StoreState>,
}

impl<B> std::fmt::Debug for CheckpointStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("settings", &self.settings)
            .finish()
    }
}

impl CheckpointStore<PostgresBackend> {
    /// Connect to the configured PostgreSQL backend, create the table if
    /// needed and load the stored checkpoint
    pub async fn connect(
        config: &CheckpointConfig,
        safe_points: Arc<dyn SafePointSource>,
    ) -> Result<Self> {
        let backend = PostgresBackend::connect(config).await?;
        Self::open(backend, safe_points, StoreSettings::from(config)).await
    }
}

impl<B: CheckpointBackend> CheckpointStore<B> {
    /// Build a store without touching the backend. Call [`CheckPoint::load`]
    /// before use.
    pub fn new(backend: B, safe_points: Arc<dyn SafePointSource>, settings: StoreSettings) -> Self {
        Self {
            backend,
            safe_points,
            settings,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Ensure the backend schema exists, then load
    pub async fn open(
        backend: B,
        safe_points: Arc<dyn SafePointSource>,
        settings: StoreSettings,
    ) -> Result<Self> {
        backend.ensure_schema().await?;

        let store = Self::new(backend, safe_points, settings);
        store.load().await?;
        Ok(store)
    }

    pub fn cluster_id(&self) -> u64 {
        self.settings.cluster_id
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Immutable copy of the current state
    pub async fn snapshot(&self) -> Checkpoint {
        let state = self.state.read().await;
        Checkpoint::new(state.commit_ts, state.positions.clone())
    }
}

#[async_trait]
impl<B: CheckpointBackend> CheckPoint for CheckpointStore<B> {
    #[instrument(skip(self), fields(cluster_id = self.settings.cluster_id))]
    async fn load(&self) -> Result<()> {
        let mut state = self.state.write().await;

        // Several versions of the row may come back; the last one scanned wins.
        let blob = self
            .backend
            .fetch(self.settings.cluster_id)
            .await?
            .pop()
            .unwrap_or_default();

        if blob.is_empty() {
            state.commit_ts = self.settings.initial_commit_ts;
            state.positions = Positions::new();
            info!(
                commit_ts = state.commit_ts,
                "No stored checkpoint, starting from initial commit ts"
            );
            return Ok(());
        }

        let checkpoint = Checkpoint::decode(&blob).map_err(|e| {
            error!(error = %e, "Stored checkpoint is corrupt");
            e
        })?;

        state.commit_ts = if checkpoint.commit_ts == 0 {
            self.settings.initial_commit_ts
        } else {
            checkpoint.commit_ts
        };
        state.positions = checkpoint.positions;

        info!(
            commit_ts = state.commit_ts,
            streams = state.positions.len(),
            "Loaded checkpoint"
        );
        Ok(())
    }

    #[instrument(skip(self, positions), fields(cluster_id = self.settings.cluster_id))]
    async fn save(&self, commit_ts: i64, positions: &Positions) -> Result<()> {
        let mut state = self.state.write().await;

        // Counted against the throttle even if the save fails below.
        state.save_time = Some(Instant::now());

        let safe = match self.safe_points.pop_safe() {
            PoppedSafePoint::Forced => Checkpoint::new(commit_ts, positions.clone()),
            PoppedSafePoint::Safe(checkpoint) => checkpoint,
            PoppedSafePoint::NotReady => {
                debug!("No safe checkpoint available yet, skipping save");
                return Ok(());
            }
        };

        let next = Checkpoint::new(safe.commit_ts, apply_safety_margin(&safe.positions));
        let blob = next.encode().map_err(|e| {
            error!(error = %e, "Checkpoint encode error");
            e
        })?;

        self.backend.upsert(self.settings.cluster_id, &blob).await?;

        state.commit_ts = next.commit_ts;
        state.positions = next.positions;

        log_checkpoint_operation(
            "save",
            self.settings.cluster_id,
            state.commit_ts,
            "persisted",
            None,
        );
        Ok(())
    }

    async fn check(&self, commit_ts: i64, positions: &Positions) -> bool {
        let state = self.state.read().await;

        self.safe_points.push_pending(commit_ts, positions);

        match state.save_time {
            Some(save_time) => save_time.elapsed() >= self.settings.save_interval,
            None => true,
        }
    }

    async fn pos(&self) -> (i64, Positions) {
        let state = self.state.read().await;
        (state.commit_ts, state.positions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::position::Position;
    use crate::safe_point::MetaCheckpoint;

    fn settings() -> StoreSettings {
        StoreSettings {
            cluster_id: 7,
            initial_commit_ts: 100,
            save_interval: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_settings_from_config() {
        let config = CheckpointConfig {
            cluster_id: 9,
            initial_commit_ts: 55,
            save_interval_ms: 250,
            ..Default::default()
        };

        assert_eq!(
            StoreSettings::from(&config),
            StoreSettings {
                cluster_id: 9,
                initial_commit_ts: 55,
                save_interval: Duration::from_millis(250),
            }
        );
    }

    #[tokio::test]
    async fn test_open_loads_initial_state() {
        let meta = Arc::new(MetaCheckpoint::new());
        let store = CheckpointStore::open(MemoryBackend::new(), meta, settings())
            .await
            .unwrap();

        assert_eq!(store.snapshot().await, Checkpoint::new(100, Positions::new()));
        assert_eq!(store.cluster_id(), 7);
    }

    #[tokio::test]
    async fn test_check_before_first_save_is_due() {
        let meta = Arc::new(MetaCheckpoint::new());
        let store = CheckpointStore::new(MemoryBackend::new(), meta.clone(), settings());

        let mut positions = Positions::new();
        positions.insert("n1".to_string(), Position::new(0u32, 10));

        assert!(store.check(5, &positions).await);
        assert!(meta.has_pending());
    }

    #[tokio::test]
    async fn test_describe_renders_state() {
        let meta = Arc::new(MetaCheckpoint::new());
        let store = CheckpointStore::open(MemoryBackend::new(), meta, settings())
            .await
            .unwrap();

        assert_eq!(
            store.describe().await,
            "binlog commitTS = 100 and positions = {}"
        );
    }
}
