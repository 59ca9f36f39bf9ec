#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Drainer Checkpoint
//!
//! Durable resume points for a binlog replication drainer.
//!
//! ## Overview
//!
//! The drainer copies change events from many upstream binlog streams into a
//! downstream store. This crate records, at intervals, a globally consistent
//! resume point: a commit timestamp plus a position in every stream. After a
//! crash the drainer resumes from it without skipping unapplied events.
//!
//! ## Module Organization
//!
//! - [`store`] - the checkpoint store: load, throttled save, safety margin
//! - [`checkpoint`] - the persisted value, its blob format and the [`CheckPoint`] trait
//! - [`safe_point`] - the aggregator that certifies candidates as durable
//! - [`backend`] - PostgreSQL and in-memory row stores
//! - [`position`] - stream positions and the safety margin
//! - [`config`] - configuration model and layered loading
//! - [`error`] - structured error handling
//! - [`logging`] - tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drainer_checkpoint::{CheckPoint, CheckpointStore, ConfigLoader, MetaCheckpoint};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().with_file("config/checkpoint.toml").load()?;
//! let meta = Arc::new(MetaCheckpoint::new());
//! let store = CheckpointStore::connect(&config, meta.clone()).await?;
//!
//! let (commit_ts, positions) = store.pos().await;
//! if store.check(commit_ts, &positions).await {
//!     store.save(commit_ts, &positions).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod logging;
pub mod position;
pub mod safe_point;
pub mod store;

pub use backend::{CheckpointBackend, MemoryBackend, PostgresBackend};
pub use checkpoint::{CheckPoint, Checkpoint};
pub use config::{CheckpointConfig, ConfigLoader, DatabaseConfig};
pub use error::{CheckpointError, Result};
pub use position::{Position, Positions, Suffix, SAFETY_MARGIN};
pub use safe_point::{MetaCheckpoint, PoppedSafePoint, SafePointSource};
pub use store::{CheckpointStore, StoreSettings};
