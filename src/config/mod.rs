//! # Checkpoint Configuration
//!
//! Settings consumed when a checkpoint store is constructed: where the
//! backend lives, which schema/table hold the checkpoint rows, which cluster
//! row this process owns, and how often saves may happen.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drainer_checkpoint::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_file("config/checkpoint.toml")
//!     .load()?;
//!
//! let endpoints = config.database.endpoints()?;
//! println!("checkpoint backend at {}", endpoints[0]);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{CheckpointError, Result};

pub use loader::ConfigLoader;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_SCHEMA: &str = "tidb_binlog";
pub const DEFAULT_TABLE: &str = "checkpoint";
pub const DEFAULT_SAVE_INTERVAL_MS: u64 = 3000;

/// Root checkpoint configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Backend connection settings
    pub database: DatabaseConfig,

    /// Schema holding the checkpoint table
    pub schema: String,

    /// Table holding one row per cluster
    pub table: String,

    /// Row key owned by this pipeline instance
    pub cluster_id: u64,

    /// Commit ts used when no checkpoint has been stored yet
    pub initial_commit_ts: i64,

    /// Minimum time between saves, in milliseconds
    pub save_interval_ms: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            schema: DEFAULT_SCHEMA.to_string(),
            table: DEFAULT_TABLE.to_string(),
            cluster_id: 0,
            initial_commit_ts: 0,
            save_interval_ms: DEFAULT_SAVE_INTERVAL_MS,
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Comma separated `host[:port]` list; the first entry is used
    pub host: String,
    /// Port for entries in `host` that carry none
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: "default".to_string(),
            password: String::new(),
            database: None,
            max_connections: 4,
            acquire_timeout_seconds: 10,
        }
    }
}

/// One parsed backend address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    /// Parse `host` into endpoints
    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut endpoints = Vec::new();

        for entry in self.host.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(CheckpointError::configuration(format!(
                    "malformed backend address '{}': empty entry",
                    self.host
                )));
            }

            let (host, port) = split_host_port(entry)?;
            let port = match port {
                Some(port) => port.parse::<u16>().map_err(|e| {
                    CheckpointError::configuration(format!(
                        "malformed backend address '{entry}': invalid port: {e}"
                    ))
                })?,
                None => self.port,
            };

            if host.is_empty() {
                return Err(CheckpointError::configuration(format!(
                    "malformed backend address '{entry}': missing host"
                )));
            }

            endpoints.push(Endpoint {
                host: host.to_string(),
                port,
            });
        }

        Ok(endpoints)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

impl CheckpointConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }

    /// Validate everything construction depends on
    pub fn validate(&self) -> Result<()> {
        self.database.endpoints()?;

        if self.database.max_connections == 0 {
            return Err(CheckpointError::configuration(
                "database.max_connections must be greater than 0",
            ));
        }

        validate_identifier("schema", &self.schema)?;
        validate_identifier("table", &self.table)?;

        Ok(())
    }

    /// JSON rendering with credentials masked, for logs
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self);
        mask_sensitive(&mut value);
        value
    }
}

/// Split `host[:port]`; IPv6 hosts must be bracketed, as in `[::1]:9000`.
fn split_host_port(entry: &str) -> Result<(&str, Option<&str>)> {
    if let Some(rest) = entry.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            CheckpointError::configuration(format!(
                "malformed backend address '{entry}': unterminated '['"
            ))
        })?;
        return match tail {
            "" => Ok((host, None)),
            _ => match tail.strip_prefix(':') {
                Some(port) => Ok((host, Some(port))),
                None => Err(CheckpointError::configuration(format!(
                    "malformed backend address '{entry}': unexpected text after ']'"
                ))),
            },
        };
    }

    match entry.split_once(':') {
        Some((_, port)) if port.contains(':') => Err(CheckpointError::configuration(format!(
            "malformed backend address '{entry}': IPv6 hosts must be written as [addr]:port"
        ))),
        Some((host, port)) => Ok((host, Some(port))),
        None => Ok((entry, None)),
    }
}

/// Schema and table names are interpolated into DDL, so only plain identifiers pass.
fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CheckpointError::configuration(format!(
            "{field} must not be empty"
        )));
    }

    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CheckpointError::configuration(format!(
            "{field} '{value}' may only contain ASCII letters, digits and '_'"
        )));
    }

    Ok(())
}

fn mask_sensitive(value: &mut serde_json::Value) {
    const SENSITIVE: [&str; 4] = ["password", "secret", "token", "credential"];

    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key = key.to_lowercase();
                if SENSITIVE.iter().any(|pattern| key.contains(pattern)) {
                    let is_empty = matches!(val, serde_json::Value::String(s) if s.is_empty());
                    let masked = if is_empty { "[EMPTY]" } else { "[MASKED]" };
                    *val = serde_json::Value::String(masked.to_string());
                } else {
                    mask_sensitive(val);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(mask_sensitive),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckpointConfig::default();
        assert_eq!(config.database.host, "127.0.0.1");
        assert_eq!(config.database.port, 9000);
        assert_eq!(config.schema, "tidb_binlog");
        assert_eq!(config.table, "checkpoint");
        assert_eq!(config.save_interval(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_without_port_uses_default() {
        let config = DatabaseConfig::default();
        assert_eq!(
            config.endpoints().unwrap(),
            vec![Endpoint {
                host: "127.0.0.1".to_string(),
                port: 9000
            }]
        );
    }

    #[test]
    fn test_endpoint_list() {
        let config = DatabaseConfig {
            host: "10.0.0.1:9001, 10.0.0.2".to_string(),
            port: 9100,
            ..Default::default()
        };

        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].to_string(), "10.0.0.1:9001");
        assert_eq!(endpoints[1].to_string(), "10.0.0.2:9100");
    }

    #[test]
    fn test_bracketed_ipv6_endpoints() {
        let config = DatabaseConfig {
            host: "[::1]:9001,[fe80::2]".to_string(),
            ..Default::default()
        };

        let endpoints = config.endpoints().unwrap();
        assert_eq!(
            endpoints,
            vec![
                Endpoint {
                    host: "::1".to_string(),
                    port: 9001
                },
                Endpoint {
                    host: "fe80::2".to_string(),
                    port: 9000
                },
            ]
        );
    }

    #[test]
    fn test_malformed_addresses() {
        let malformed = [
            "", "a:b", "host:70000", ":9000", "h1,,h2", "::1", "[::1", "[::1]9000", "[]:9000",
        ];
        for host in malformed {
            let config = DatabaseConfig {
                host: host.to_string(),
                ..Default::default()
            };
            let err = config.endpoints().unwrap_err();
            assert!(
                matches!(err, CheckpointError::Configuration(_)),
                "expected configuration error for '{host}'"
            );
        }
    }

    #[test]
    fn test_identifier_validation() {
        let mut config = CheckpointConfig::default();
        config.table = "checkpoint; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        config.table = String::new();
        assert!(config.validate().is_err());

        config.table = "checkpoint_v2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = CheckpointConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sanitized_masks_password() {
        let mut config = CheckpointConfig::default();
        config.database.password = "hunter2".to_string();

        let sanitized = config.sanitized();
        assert_eq!(sanitized["database"]["password"], "[MASKED]");
        assert_eq!(sanitized["database"]["host"], "127.0.0.1");

        config.database.password.clear();
        assert_eq!(config.sanitized()["database"]["password"], "[EMPTY]");
    }
}
