//! # Checkpoint
//!
//! The persisted resume point and the capability the replication loop drives.
//!
//! A [`Checkpoint`] is an immutable `(commit ts, positions)` pair. The store
//! keeps its own mutable state and produces a fresh `Checkpoint` for every
//! write, so the blob format below is decoupled from the in-memory layout:
//!
//! ```json
//! { "commitTS": 425110000000000, "positions": { "node-1": {"Suffix": 0, "Offset": 2000} } }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CheckpointError, Result};
use crate::position::Positions;

/// A `(commit ts, positions)` pair, as stored and as exchanged with the safe-point source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "commitTS", default)]
    pub commit_ts: i64,
    #[serde(default)]
    pub positions: Positions,
}

impl Checkpoint {
    pub fn new(commit_ts: i64, positions: Positions) -> Self {
        Self {
            commit_ts,
            positions,
        }
    }

    /// Serialize into the stored blob format
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(CheckpointError::Encode)
    }

    /// Parse a stored blob. Missing fields decode as zero/empty.
    pub fn decode(blob: &str) -> Result<Self> {
        serde_json::from_str(blob).map_err(CheckpointError::Decode)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binlog commitTS = {} and positions = {{", self.commit_ts)?;
        for (i, (node_id, pos)) in self.positions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node_id}: {pos}")?;
        }
        write!(f, "}}")
    }
}

/// Checkpoint capability consumed by the replication loop
///
/// Any backend substituted behind this trait must keep the same semantics:
/// `check` only reports a pending candidate and answers whether a save is due,
/// `save` persists whatever the safe-point source certifies.
#[async_trait]
pub trait CheckPoint: Send + Sync {
    /// Replace in-memory state with the last persisted checkpoint.
    async fn load(&self) -> Result<()>;

    /// Persist the current safe point, or `commit_ts`/`positions` on a forced save.
    async fn save(&self, commit_ts: i64, positions: &Positions) -> Result<()>;

    /// Report a pending candidate; returns whether the save interval has elapsed.
    async fn check(&self, commit_ts: i64, positions: &Positions) -> bool;

    /// Copy of the current commit ts and positions.
    async fn pos(&self) -> (i64, Positions);

    /// Human readable rendering of the current state.
    async fn describe(&self) -> String {
        let (commit_ts, positions) = self.pos().await;
        Checkpoint::new(commit_ts, positions).to_string()
    }
}
