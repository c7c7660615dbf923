#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! Ingest a small ward set, then answer questions against wiremock doubles of
//! Ollama and Nominatim

use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;
use ward_rag::app::AppContext;
use ward_rag::config::{Config, OllamaConfig};
use ward_rag::indexer::{IngestOptions, Ingestor};
use ward_rag::query::FailureKind;
use ward_rag::spatial::Coordinates;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const DELHI_WARDS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature",
     "properties": {"WARD_NO": "80", "WARD_NAME": "Chandni Chowk", "ZONE": "City SP"},
     "geometry": {"type": "Polygon", "coordinates": [[[77.20, 28.63], [77.26, 28.63], [77.26, 28.68], [77.20, 28.68], [77.20, 28.63]]]}},
    {"type": "Feature",
     "properties": {"WARD_NO": "141", "WARD_NAME": "Hauz Khas", "ZONE": "South"},
     "geometry": {"type": "MultiPolygon", "coordinates": [[[[77.18, 28.53], [77.22, 28.53], [77.22, 28.56], [77.18, 28.56], [77.18, 28.53]]]]}}
  ]
}"#;

struct Harness {
    _temp: TempDir,
    ollama: MockServer,
    nominatim: MockServer,
    config: Config,
}

impl Harness {
    async fn start() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let ollama = MockServer::start().await;
        let nominatim = MockServer::start().await;

        let source = temp.path().join("delhi_wards.geojson");
        fs::write(&source, DELHI_WARDS).expect("write fixture");

        let address = ollama.address();
        let mut config = Config {
            base_dir: temp.path().to_path_buf(),
            ollama: OllamaConfig {
                host: address.ip().to_string(),
                port: address.port(),
                embedding_dimension: 4,
                batch_size: 2,
                ..OllamaConfig::default()
            },
            ..Config::default()
        };
        config.boundaries.source = source.display().to_string();
        config.geocoder.base_url = nominatim.uri();
        config.http.retry_attempts = 1;

        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(|request: &Request| {
                let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
                let count = body["input"].as_array().map_or(0, Vec::len);
                let embeddings: Vec<Vec<f32>> = (0..count)
                    .map(|i| vec![1.0, i as f32, 0.5, 0.25])
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
            })
            .mount(&ollama)
            .await;

        Self {
            _temp: temp,
            ollama,
            nominatim,
            config,
        }
    }

    async fn ingest(&self) -> usize {
        let mut ingestor = Ingestor::new(self.config.clone()).await.expect("ingestor");
        let stats = ingestor
            .run(IngestOptions::default())
            .await
            .expect("ingestion should succeed");
        stats.embedded
    }

    async fn extraction_replies(&self, landmark: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_string_contains("Landmark name:"))
            .respond_with(chat_reply(landmark))
            .mount(&self.ollama)
            .await;
    }

    async fn landmark_at(&self, query: &str, latitude: &str, longitude: &str) {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", query))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"lat": latitude, "lon": longitude, "display_name": query, "importance": 0.6}
            ])))
            .mount(&self.nominatim)
            .await;
    }
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "message": {"role": "assistant", "content": content},
        "done": true
    }))
}

#[tokio::test]
async fn red_fort_resolves_to_its_ward() {
    let harness = Harness::start().await;
    assert_eq!(harness.ingest().await, 2);

    harness.extraction_replies("Red Fort").await;
    harness
        .landmark_at("Red Fort, Delhi, India", "28.6561592", "77.2410203")
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("ward number 80, named Chandni Chowk"))
        .and(body_string_contains("municipal ward number 80, named Chandni Chowk, in Delhi"))
        .respond_with(chat_reply("The Red Fort is in ward 80, Chandni Chowk."))
        .expect(1)
        .mount(&harness.ollama)
        .await;

    let context = AppContext::initialize(harness.config.clone())
        .await
        .expect("context");
    let result = context.ask("Which ward is the Red Fort in?").await;

    assert!(result.is_success(), "unexpected failure: {:?}", result.failure);
    assert_eq!(result.landmark.as_deref(), Some("Red Fort"));
    assert_eq!(
        result.coordinates,
        Some(Coordinates::new(28.6561592, 77.2410203))
    );
    assert_eq!(result.answer, "The Red Fort is in ward 80, Chandni Chowk.");

    let json = serde_json::to_value(&result).expect("serialize");
    assert_eq!(json["ward"]["id"], "80");
    assert_eq!(json["ward"]["name"], "Chandni Chowk");
    assert_eq!(json["ward"]["geometry"]["type"], "MultiPolygon");
}

#[tokio::test]
async fn landmark_outside_city_gets_fallback() {
    let harness = Harness::start().await;
    harness.ingest().await;

    harness.extraction_replies("Gateway of India").await;
    harness
        .landmark_at("Gateway of India, Delhi, India", "18.9219841", "72.8346543")
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("USER QUESTION"))
        .respond_with(chat_reply("should not be asked"))
        .expect(0)
        .mount(&harness.ollama)
        .await;

    let context = AppContext::initialize(harness.config.clone())
        .await
        .expect("context");
    let result = context.ask("Which ward is the Gateway of India in?").await;

    let failure = result.failure.expect("failure");
    assert_eq!(failure.kind, FailureKind::NoContainingWard);
    assert_eq!(result.answer, FailureKind::NoContainingWard.fallback_message());
    assert!(result.ward.is_none());
}

#[tokio::test]
async fn question_without_landmark_gets_fallback() {
    let harness = Harness::start().await;
    harness.ingest().await;

    harness.extraction_replies("NONE").await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&harness.nominatim)
        .await;

    let context = AppContext::initialize(harness.config.clone())
        .await
        .expect("context");
    let result = context.ask("How are you today?").await;

    assert_eq!(
        result.failure.expect("failure").kind,
        FailureKind::ExtractionFailed
    );
    assert_eq!(result.answer, FailureKind::ExtractionFailed.fallback_message());
    assert!(result.landmark.is_none());
}

#[tokio::test]
async fn reingestion_keeps_one_record_per_ward() {
    let harness = Harness::start().await;
    harness.ingest().await;
    harness.ingest().await;

    let context = AppContext::initialize(harness.config.clone())
        .await
        .expect("context");

    assert_eq!(context.store().count().await.expect("count"), 2);
    assert_eq!(
        context.store().list_ids().await.expect("ids"),
        vec!["141".to_string(), "80".to_string()]
    );
    assert_eq!(context.wards().ids(), vec!["80".to_string(), "141".to_string()]);
}
