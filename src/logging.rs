//! # Structured Logging Module
//!
//! Environment-aware structured logging for the checkpoint path. Output is
//! human readable by default and JSON when `DRAINER_LOG_FORMAT=json`.

use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::loader::detect_environment;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

pub const LOG_FORMAT_VAR: &str = "DRAINER_LOG_FORMAT";

/// Initialize structured logging once per process
///
/// `RUST_LOG` wins over the per-environment default level. An already
/// installed global subscriber is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_log_level(&environment)));
        let json = std::env::var(LOG_FORMAT_VAR)
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            json,
            "Structured logging initialized"
        );
    });
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a structured checkpoint operation event
pub fn log_checkpoint_operation(
    operation: &str,
    cluster_id: u64,
    commit_ts: i64,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        cluster_id,
        commit_ts,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CHECKPOINT_OPERATION"
    );
}
