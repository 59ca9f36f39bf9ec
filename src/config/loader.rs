//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file, an optional
//! environment-specific TOML override and finally environment variables.

use ::config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::CheckpointConfig;
use crate::error::{CheckpointError, Result};

pub const DEFAULT_ENV_PREFIX: &str = "DRAINER_CHECKPOINT";
pub const ENVIRONMENT_VAR: &str = "DRAINER_ENV";

/// Builder for a layered [`CheckpointConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    environment: Option<String>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file: None,
            environment: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base TOML file. It must exist when given.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Environment name used to pick `<stem>.<environment>.toml`.
    /// Detected from `DRAINER_ENV` when not set.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Prefix for variables such as `<PREFIX>__DATABASE__HOST`
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<CheckpointConfig> {
        let environment = self
            .environment
            .clone()
            .unwrap_or_else(detect_environment);

        let mut builder =
            Config::builder().add_source(Config::try_from(&CheckpointConfig::default())?);

        if let Some(file) = &self.file {
            if !file.is_file() {
                return Err(CheckpointError::configuration(format!(
                    "configuration file not found: {}",
                    file.display()
                )));
            }
            debug!(file = %file.display(), "Loading checkpoint configuration file");
            builder = builder.add_source(File::from(file.as_path()).format(FileFormat::Toml));

            if let Some(override_file) = environment_override_path(file, &environment) {
                debug!(
                    environment = %environment,
                    file = %override_file.display(),
                    "Applying environment override file if present"
                );
                builder = builder.add_source(
                    File::from(override_file.as_path())
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: CheckpointConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            environment = %environment,
            config = %config.sanitized(),
            "Checkpoint configuration loaded"
        );

        Ok(config)
    }
}

/// `DRAINER_ENV`, lowercased, defaulting to `development`
pub fn detect_environment() -> String {
    env::var(ENVIRONMENT_VAR)
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// `config/checkpoint.toml` + `production` -> `config/checkpoint.production.toml`
fn environment_override_path(base: &Path, environment: &str) -> Option<PathBuf> {
    let stem = base.file_stem()?.to_str()?;
    let file_name = match base.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{environment}.{ext}"),
        None => format!("{stem}.{environment}"),
    };
    Some(base.with_file_name(file_name))
}
