use super::*;
use crate::boundaries::Ward;
use crate::config::OllamaConfig;
use geo::{MultiPolygon, polygon};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ollama: OllamaConfig {
            embedding_dimension: 3,
            ..OllamaConfig::default()
        },
        ..Config::default()
    };
    (config, temp_dir)
}

fn snapshot() -> WardSet {
    WardSet::new(
        "Delhi",
        "test.geojson",
        vec![Ward {
            id: "1".to_string(),
            name: Some("Narela".to_string()),
            geometry: MultiPolygon::new(vec![polygon![
                (x: 77.0, y: 28.8),
                (x: 77.1, y: 28.8),
                (x: 77.1, y: 28.9),
            ]]),
            attributes: BTreeMap::new(),
        }],
    )
}

#[tokio::test]
async fn initialize_requires_ingested_wards() {
    let (config, _temp_dir) = test_config();

    let error = AppContext::initialize(config)
        .await
        .err()
        .expect("should fail without a snapshot");
    assert!(format!("{:#}", error).contains("ward-rag ingest"));
}

#[tokio::test]
async fn initialize_loads_snapshot_and_store() {
    let (config, _temp_dir) = test_config();
    snapshot()
        .save(&config.processed_wards_path())
        .expect("save snapshot");

    let context = AppContext::initialize(config).await.expect("context");

    assert_eq!(context.wards().len(), 1);
    assert_eq!(context.wards().get("1").and_then(|w| w.name.as_deref()), Some("Narela"));
    assert_eq!(context.store().table_name(), "delhi_wards");
    assert_eq!(context.store().count().await.expect("count"), 0);

    context.shutdown();
}
