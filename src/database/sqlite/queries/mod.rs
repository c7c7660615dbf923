#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

const RUN_COLUMNS: &str = "id, source, status, started_at, finished_at, ward_count, \
                           embedded_count, skipped_count, pruned_count, error_message";

pub struct IngestRunQueries;

impl IngestRunQueries {
    /// Record a new run in the `running` state
    #[inline]
    pub async fn start(pool: &SqlitePool, source: &str) -> Result<IngestRun> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO ingest_runs (id, source, status, started_at) VALUES (?, ?, 'running', ?)",
        )
        .bind(&id)
        .bind(source)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to record ingest run")?;

        debug!("Started ingest run {}", id);

        Self::get_by_id(pool, &id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created ingest run"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<IngestRun>> {
        let query = format!("SELECT {} FROM ingest_runs WHERE id = ?", RUN_COLUMNS);
        sqlx::query_as::<_, IngestRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get ingest run by id")
    }

    #[inline]
    pub async fn complete(pool: &SqlitePool, id: &str, counts: RunCounts) -> Result<()> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE ingest_runs
            SET status = 'completed',
                finished_at = ?,
                ward_count = ?,
                embedded_count = ?,
                skipped_count = ?,
                pruned_count = ?,
                error_message = NULL
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(counts.ward_count)
        .bind(counts.embedded_count)
        .bind(counts.skipped_count)
        .bind(counts.pruned_count)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark ingest run completed")?;

        if result.rows_affected() == 0 {
            warn!("Ingest run {} not found when completing", id);
        }
        Ok(())
    }

    #[inline]
    pub async fn fail(pool: &SqlitePool, id: &str, message: &str) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            "UPDATE ingest_runs SET status = 'failed', finished_at = ?, error_message = ? WHERE id = ?",
        )
        .bind(now)
        .bind(message)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark ingest run failed")?;

        Ok(())
    }

    /// Mark runs left `running` by a process that died as failed
    ///
    /// Only call this while holding the ingestion lock.
    #[inline]
    pub async fn fail_abandoned(pool: &SqlitePool) -> Result<u64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE ingest_runs SET status = 'failed', finished_at = ?, \
             error_message = 'abandoned: the ingesting process exited early' \
             WHERE status = 'running'",
        )
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to close abandoned ingest runs")?;

        let closed = result.rows_affected();
        if closed > 0 {
            warn!("Marked {} abandoned ingest runs as failed", closed);
        }
        Ok(closed)
    }

    #[inline]
    pub async fn latest(pool: &SqlitePool) -> Result<Option<IngestRun>> {
        Ok(Self::list_recent(pool, 1).await?.into_iter().next())
    }

    #[inline]
    pub async fn latest_completed(pool: &SqlitePool) -> Result<Option<IngestRun>> {
        let query = format!(
            "SELECT {} FROM ingest_runs WHERE status = 'completed' \
             ORDER BY started_at DESC, rowid DESC LIMIT 1",
            RUN_COLUMNS
        );
        sqlx::query_as::<_, IngestRun>(&query)
            .fetch_optional(pool)
            .await
            .context("Failed to get latest completed ingest run")
    }

    /// Newest first
    #[inline]
    pub async fn list_recent(pool: &SqlitePool, limit: u32) -> Result<Vec<IngestRun>> {
        let query = format!(
            "SELECT {} FROM ingest_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
            RUN_COLUMNS
        );
        sqlx::query_as::<_, IngestRun>(&query)
            .bind(i64::from(limit))
            .fetch_all(pool)
            .await
            .context("Failed to list ingest runs")
    }
}
