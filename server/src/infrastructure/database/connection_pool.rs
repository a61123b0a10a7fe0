//! Single-writer SQLite pool (§4.1, §5 "Shared-resource policy").
//!
//! The store is configured for a single open connection and relies on WAL
//! journaling for reader concurrency at the engine level — serialized
//! single-writer mode, not a general-purpose connection pool.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ConnectionPoolConfig {
    pub database_url: String,
    pub busy_timeout: Duration,
}

impl ConnectionPoolConfig {
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

pub struct ConnectionPool {
    pool: Pool<Sqlite>,
}

impl ConnectionPool {
    /// Opens the database in serialized single-writer mode: WAL journaling,
    /// a bounded busy-timeout, and exactly one connection so sqlx never
    /// hands out a second writer to race against the first.
    pub async fn create(config: ConnectionPoolConfig) -> Result<Self, String> {
        info!(database_url = %config.database_url, "opening persistence store");

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| format!("invalid database url: {e}"))?
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout)
            .pragma("journal_mode", "WAL")
            .pragma("synchronous", "NORMAL");

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| format!("failed to open database: {e}"))?;

        Ok(Self { pool })
    }

    pub fn inner(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
