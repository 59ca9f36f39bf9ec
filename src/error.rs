use thiserror::Error;

/// Errors surfaced by the checkpoint store and its collaborators
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Failed to decode stored checkpoint: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CheckpointError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<::config::ConfigError> for CheckpointError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
