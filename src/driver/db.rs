//! Embedded SQLite resource for the database driver.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::driver::{Driver, ManagedResource};
use crate::error::{DriverError, ValidationError};
use crate::store::Validate;

fn default_max_connections() -> u32 {
    5
}

fn default_create_if_missing() -> bool {
    true
}

/// Configuration fragment for a [`SqliteDatabase`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path of the database file.
    pub path: PathBuf,
    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Create the database file when absent.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ValidationError::invalid_field("path", "must not be empty"));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::invalid_field(
                "max_connections",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// An embedded SQLite connection pool managed as a driver resource.
///
/// Starting opens the pool and establishes a first connection, so an
/// unreachable database file fails the start rather than deferring the
/// error to the first query. The open pool is shared with collaborators
/// through [`pool`](Self::pool).
#[derive(Debug, Default)]
pub struct SqliteDatabase {
    pool: Option<SqlitePool>,
}

impl SqliteDatabase {
    /// Create a disconnected database resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a pool is open.
    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    /// The open pool, for collaborators issuing queries.
    pub fn pool(&self) -> Option<SqlitePool> {
        self.pool.clone()
    }
}

#[async_trait]
impl ManagedResource for SqliteDatabase {
    type Config = DatabaseConfig;

    async fn start(&mut self, config: Option<&DatabaseConfig>) -> Result<(), DriverError> {
        let config = config.ok_or(DriverError::NotConfigured)?;

        if self.pool.is_some() {
            self.stop().await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.create_if_missing);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!(path = %config.path.display(), "Database connected");
        self.pool = Some(pool);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DriverError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            info!("Database closed");
        }
        Ok(())
    }
}

impl Driver<SqliteDatabase> {
    /// True while the pool is open.
    pub async fn is_connected(&self) -> bool {
        self.with_resource(SqliteDatabase::is_connected).await
    }

    /// The open pool, when connected.
    pub async fn pool(&self) -> Option<SqlitePool> {
        self.with_resource(SqliteDatabase::pool).await
    }
}
