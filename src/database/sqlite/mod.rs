use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{IngestRun, RunCounts};
use crate::database::sqlite::queries::IngestRunQueries;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// The SQLite ingestion ledger
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("metadata.db")).await
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // Ingest run ledger
    #[inline]
    pub async fn start_run(&self, source: &str) -> Result<IngestRun> {
        IngestRunQueries::start(&self.pool, source).await
    }

    #[inline]
    pub async fn complete_run(&self, id: &str, counts: RunCounts) -> Result<()> {
        IngestRunQueries::complete(&self.pool, id, counts).await
    }

    #[inline]
    pub async fn fail_run(&self, id: &str, message: &str) -> Result<()> {
        IngestRunQueries::fail(&self.pool, id, message).await
    }

    #[inline]
    pub async fn fail_abandoned_runs(&self) -> Result<u64> {
        IngestRunQueries::fail_abandoned(&self.pool).await
    }

    #[inline]
    pub async fn latest_run(&self) -> Result<Option<IngestRun>> {
        IngestRunQueries::latest(&self.pool).await
    }

    #[inline]
    pub async fn latest_completed_run(&self) -> Result<Option<IngestRun>> {
        IngestRunQueries::latest_completed(&self.pool).await
    }

    #[inline]
    pub async fn recent_runs(&self, limit: u32) -> Result<Vec<IngestRun>> {
        IngestRunQueries::list_recent(&self.pool, limit).await
    }
}
