use super::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn geocoder_for(server: &MockServer) -> Geocoder {
    let mut config = Config::default();
    config.geocoder.base_url = server.uri();
    config.geocoder.user_agent = "ward-test/1.0".to_string();

    Geocoder::new(&config)
        .expect("geocoder should build")
        .with_http(
            HttpClient::new(&config.http)
                .with_retry_attempts(1)
                .with_timeout(Duration::from_secs(5)),
        )
}

async fn mount_results(server: &MockServer, results: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results))
        .mount(server)
        .await;
}

#[tokio::test]
async fn query_is_scoped_to_region() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Red Fort, Delhi, India"))
        .and(query_param("format", "jsonv2"))
        .and(query_param("limit", "5"))
        .and(header("User-Agent", "ward-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"lat": "28.6561592", "lon": "77.2410203", "display_name": "Red Fort, Delhi", "importance": 0.62}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let landmark = geocoder_for(&server)
        .geocode("Red Fort")
        .expect("geocode should succeed");

    assert_eq!(landmark.name, "Red Fort");
    assert_eq!(landmark.coordinates, Coordinates::new(28.6561592, 77.2410203));
    assert_eq!(landmark.display_name.as_deref(), Some("Red Fort, Delhi"));
}

#[tokio::test]
async fn first_result_wins_by_default() {
    let server = MockServer::start().await;
    mount_results(
        &server,
        json!([
            {"lat": "28.61", "lon": "77.20", "importance": 0.5},
            {"lat": "28.70", "lon": "77.10", "importance": 0.5}
        ]),
    )
    .await;

    let landmark = geocoder_for(&server).geocode("Hanuman Mandir").expect("geocode");
    assert_eq!(landmark.coordinates, Coordinates::new(28.61, 77.20));
}

#[tokio::test]
async fn strict_policy_reports_ties() {
    let server = MockServer::start().await;
    mount_results(
        &server,
        json!([
            {"lat": "28.61", "lon": "77.20", "importance": 0.5},
            {"lat": "28.70", "lon": "77.10", "importance": 0.5},
            {"lat": "28.50", "lon": "77.30", "importance": 0.2}
        ]),
    )
    .await;

    let result = geocoder_for(&server)
        .with_tie_break(TieBreak::Strict)
        .geocode("Hanuman Mandir");

    match result {
        Err(WardError::AmbiguousMatch {
            landmark,
            candidates,
        }) => {
            assert_eq!(landmark, "Hanuman Mandir");
            assert_eq!(candidates, 2);
        }
        other => panic!("expected ambiguous match, got {:?}", other),
    }
}

#[tokio::test]
async fn strict_policy_accepts_clear_winner() {
    let server = MockServer::start().await;
    mount_results(
        &server,
        json!([
            {"lat": "28.61", "lon": "77.20", "importance": 0.7},
            {"lat": "28.70", "lon": "77.10", "importance": 0.5}
        ]),
    )
    .await;

    let landmark = geocoder_for(&server)
        .with_tie_break(TieBreak::Strict)
        .geocode("India Gate")
        .expect("clear winner");
    assert_eq!(landmark.coordinates, Coordinates::new(28.61, 77.20));
}

#[tokio::test]
async fn empty_results_are_not_found() {
    let server = MockServer::start().await;
    mount_results(&server, json!([])).await;

    assert!(matches!(
        geocoder_for(&server).geocode("Atlantis"),
        Err(WardError::NotFound { .. })
    ));
}

#[tokio::test]
async fn unparseable_coordinates_are_skipped() {
    let server = MockServer::start().await;
    mount_results(
        &server,
        json!([
            {"lat": "north", "lon": "77.2"},
            {"lat": "28.63", "lon": "77.22"}
        ]),
    )
    .await;

    let landmark = geocoder_for(&server).geocode("Connaught Place").expect("geocode");
    assert_eq!(landmark.coordinates, Coordinates::new(28.63, 77.22));
}

#[tokio::test]
async fn service_failure_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(matches!(
        geocoder_for(&server).geocode("Red Fort"),
        Err(WardError::NotFound { .. })
    ));
}

#[test]
fn blank_region_is_not_appended() {
    let mut config = Config::default();
    config.geocoder.region = String::new();
    let geocoder = Geocoder::new(&config).expect("geocoder");

    assert_eq!(geocoder.scoped_query(" Qutub Minar "), "Qutub Minar");
}
