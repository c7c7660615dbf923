use super::*;
use crate::database::sqlite::Database;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn start_creates_running_row() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let run = IngestRunQueries::start(database.pool(), "wards.geojson").await?;

    assert!(run.is_running());
    assert_eq!(run.source, "wards.geojson");
    assert!(run.finished_at.is_none());
    assert!(Uuid::parse_str(&run.id).is_ok());
    Ok(())
}

#[tokio::test]
async fn complete_records_counts() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let run = IngestRunQueries::start(database.pool(), "wards.geojson").await?;

    let counts = RunCounts {
        ward_count: 3,
        embedded_count: 2,
        skipped_count: 1,
        pruned_count: 4,
    };
    IngestRunQueries::complete(database.pool(), &run.id, counts).await?;

    let stored = IngestRunQueries::get_by_id(database.pool(), &run.id)
        .await?
        .expect("run exists");
    assert!(stored.is_completed());
    assert!(stored.finished_at.is_some());
    assert_eq!(stored.counts(), counts);
    Ok(())
}

#[tokio::test]
async fn fail_keeps_message() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let run = IngestRunQueries::start(database.pool(), "wards.geojson").await?;

    IngestRunQueries::fail(database.pool(), &run.id, "Schema error in feature #4").await?;

    let stored = IngestRunQueries::latest(database.pool())
        .await?
        .expect("run exists");
    assert!(stored.is_failed());
    assert_eq!(
        stored.error_message.as_deref(),
        Some("Schema error in feature #4")
    );
    Ok(())
}

#[tokio::test]
async fn abandoned_runs_are_closed() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    IngestRunQueries::start(database.pool(), "a").await?;
    IngestRunQueries::start(database.pool(), "b").await?;

    let closed = IngestRunQueries::fail_abandoned(database.pool()).await?;
    assert_eq!(closed, 2);

    let runs = IngestRunQueries::list_recent(database.pool(), 10).await?;
    assert!(runs.iter().all(IngestRun::is_failed));
    Ok(())
}

#[tokio::test]
async fn latest_completed_skips_failures() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let good = IngestRunQueries::start(database.pool(), "good").await?;
    IngestRunQueries::complete(database.pool(), &good.id, RunCounts::default()).await?;
    let bad = IngestRunQueries::start(database.pool(), "bad").await?;
    IngestRunQueries::fail(database.pool(), &bad.id, "boom").await?;

    let latest = IngestRunQueries::latest(database.pool())
        .await?
        .expect("latest");
    assert_eq!(latest.source, "bad");

    let completed = IngestRunQueries::latest_completed(database.pool())
        .await?
        .expect("completed");
    assert_eq!(completed.source, "good");
    Ok(())
}

#[tokio::test]
async fn list_recent_respects_limit() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    for source in ["one", "two", "three"] {
        IngestRunQueries::start(database.pool(), source).await?;
    }

    let runs = IngestRunQueries::list_recent(database.pool(), 2).await?;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].source, "three");
    Ok(())
}
