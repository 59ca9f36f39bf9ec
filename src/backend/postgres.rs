//! PostgreSQL checkpoint table.
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "tidb_binlog"."checkpoint" (
//!     clusterid  BIGINT PRIMARY KEY,
//!     checkpoint TEXT NOT NULL
//! )
//! ```

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use tracing::{debug, error, info, instrument};

use super::CheckpointBackend;
use crate::config::CheckpointConfig;
use crate::error::{CheckpointError, Result};

/// Checkpoint rows in a PostgreSQL table
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    schema: String,
    table: String,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("schema", &self.schema)
            .field("table", &self.table)
            .finish()
    }
}

/// Cluster ids are u64; BIGINT holds the same 64 bits.
fn cluster_key(cluster_id: u64) -> i64 {
    cluster_id as i64
}

impl PostgresBackend {
    /// Wrap an existing pool. `schema` and `table` must already be validated.
    pub fn new(pool: PgPool, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Open a pool against the first configured endpoint
    #[instrument(skip(config), fields(host = %config.database.host))]
    pub async fn connect(config: &CheckpointConfig) -> Result<Self> {
        config.validate()?;

        let endpoints = config.database.endpoints()?;
        let endpoint = endpoints
            .first()
            .ok_or_else(|| CheckpointError::configuration("no backend address configured"))?;

        let mut options = PgConnectOptions::new()
            .host(&endpoint.host)
            .port(endpoint.port)
            .username(&config.database.user)
            .password(&config.database.password);
        if let Some(database) = &config.database.database {
            options = options.database(database);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(config.database.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                error!(endpoint = %endpoint, error = %e, "Failed to connect to checkpoint backend");
                CheckpointError::database("connect", e)
            })?;

        info!(endpoint = %endpoint, "Connected to checkpoint backend");

        Ok(Self::new(pool, &config.schema, &config.table))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn qualified_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS health")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CheckpointError::database("health check", e))?;

        let health: i32 = row
            .try_get("health")
            .map_err(|e| CheckpointError::database("health check", e))?;
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CheckpointBackend for PostgresBackend {
    #[instrument(skip(self), fields(schema = %self.schema, table = %self.table))]
    async fn ensure_schema(&self) -> Result<()> {
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.schema);
        sqlx::query(&create_schema)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Create schema error");
                CheckpointError::database("create schema", e)
            })?;

        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {} (clusterid BIGINT PRIMARY KEY, checkpoint TEXT NOT NULL)",
            self.qualified_table()
        );
        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Create table error");
                CheckpointError::database("create table", e)
            })?;

        debug!("Checkpoint table ready");
        Ok(())
    }

    async fn fetch(&self, cluster_id: u64) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT checkpoint FROM {} WHERE clusterid = $1",
            self.qualified_table()
        );

        let rows = sqlx::query(&sql)
            .bind(cluster_key(cluster_id))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(cluster_id, error = %e, "Select checkpoint error");
                CheckpointError::database("select checkpoint", e)
            })?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("checkpoint")
                    .map_err(|e| CheckpointError::database("scan checkpoint row", e))
            })
            .collect()
    }

    async fn upsert(&self, cluster_id: u64, blob: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (clusterid, checkpoint) VALUES ($1, $2) \
             ON CONFLICT (clusterid) DO UPDATE SET checkpoint = EXCLUDED.checkpoint",
            self.qualified_table()
        );

        sqlx::query(&sql)
            .bind(cluster_key(cluster_id))
            .bind(blob)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(cluster_id, error = %e, "Write checkpoint error");
                CheckpointError::database("write checkpoint", e)
            })?;

        Ok(())
    }
}
