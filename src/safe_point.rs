//! # Safe-Point Source
//!
//! Producers report candidate checkpoints here while the apply path decides
//! when a candidate has become durable downstream. The store pops the
//! certified point when it saves.
//!
//! The source is shared between the store and unrelated producers on other
//! threads, so implementations synchronise internally.

use parking_lot::Mutex;
use tracing::debug;

use crate::checkpoint::Checkpoint;
use crate::position::Positions;

/// Result of popping the safe point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoppedSafePoint {
    /// Persist the caller supplied checkpoint, bypassing aggregation
    Forced,
    /// A checkpoint certified durable
    Safe(Checkpoint),
    /// Nothing certified yet
    NotReady,
}

/// Aggregator of pending checkpoints, handed to the store at construction
pub trait SafePointSource: Send + Sync {
    /// Report a candidate checkpoint
    fn push_pending(&self, commit_ts: i64, positions: &Positions);

    /// Take the current safe point, clearing it and any force request
    fn pop_safe(&self) -> PoppedSafePoint;
}

#[derive(Debug, Default)]
struct MetaState {
    pending: Option<Checkpoint>,
    safe: Option<Checkpoint>,
    force_save: bool,
}

/// In-process safe-point aggregator for a single downstream writer
///
/// The first pending candidate is pinned until the writer reports a flush;
/// later candidates are dropped meanwhile so the pinned one cannot be
/// replaced by positions the writer has not applied yet.
#[derive(Debug, Default)]
pub struct MetaCheckpoint {
    state: Mutex<MetaState>,
}

impl MetaCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the apply path once everything up to the pinned candidate
    /// is durable downstream. `force` additionally requests a forced save.
    pub fn flush(&self, force: bool) {
        let mut state = self.state.lock();

        if let Some(pending) = state.pending.take() {
            debug!(commit_ts = pending.commit_ts, "Pending checkpoint certified safe");
            state.safe = Some(pending);
        }

        if force {
            state.force_save = true;
        }
    }

    /// Ask the next save to persist its caller supplied checkpoint
    pub fn request_force_save(&self) {
        self.state.lock().force_save = true;
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

impl SafePointSource for MetaCheckpoint {
    fn push_pending(&self, commit_ts: i64, positions: &Positions) {
        let mut state = self.state.lock();

        if state.pending.is_none() {
            state.pending = Some(Checkpoint::new(commit_ts, positions.clone()));
        }
    }

    fn pop_safe(&self) -> PoppedSafePoint {
        let mut state = self.state.lock();

        let safe = state.safe.take();
        if std::mem::take(&mut state.force_save) {
            return PoppedSafePoint::Forced;
        }

        match safe {
            Some(checkpoint) => PoppedSafePoint::Safe(checkpoint),
            None => PoppedSafePoint::NotReady,
        }
    }
}
