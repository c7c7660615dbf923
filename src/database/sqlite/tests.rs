use super::*;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
    )
    .fetch_all(database.pool())
    .await?;

    let actual_tables: HashSet<&str> = tables.iter().map(String::as_str).collect();
    assert_eq!(actual_tables, HashSet::from(["ingest_runs"]));

    Ok(())
}

#[tokio::test]
async fn reopening_keeps_history() -> Result<()> {
    let temp_dir = TempDir::new()?;

    {
        let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
        let run = database.start_run("wards.geojson").await?;
        database
            .complete_run(
                &run.id,
                RunCounts {
                    ward_count: 1,
                    embedded_count: 1,
                    ..RunCounts::default()
                },
            )
            .await?;
        database.close().await;
    }

    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    let latest = database.latest_completed_run().await?.expect("history kept");
    assert_eq!(latest.ward_count, 1);
    assert_eq!(database.recent_runs(10).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn status_check_constraint_rejects_unknown_values() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let result = sqlx::query(
        "INSERT INTO ingest_runs (id, source, status, started_at) VALUES ('x', 's', 'paused', '2025-01-01 00:00:00')",
    )
    .execute(database.pool())
    .await;

    assert!(result.is_err());
    Ok(())
}
