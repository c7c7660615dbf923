use super::*;
use crate::config::OllamaConfig;
use crate::http::HttpClient;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn extractor_replying(reply: &str) -> (MockServer, EntityExtractor) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"role": "assistant", "content": reply},
            "done": true
        })))
        .mount(&server)
        .await;

    let extractor = extractor_for(&server);
    (server, extractor)
}

fn extractor_for(server: &MockServer) -> EntityExtractor {
    let address = server.address();
    let config = Config {
        ollama: OllamaConfig {
            host: address.ip().to_string(),
            port: address.port(),
            ..OllamaConfig::default()
        },
        ..Config::default()
    };
    let chat = ChatClient::new(&config).expect("chat client").with_http(
        HttpClient::new(&config.http)
            .with_retry_attempts(1)
            .with_timeout(Duration::from_secs(5)),
    );
    EntityExtractor::new(chat, &config)
}

#[test]
fn reply_cleaning() {
    assert_eq!(clean_reply("Red Fort"), "Red Fort");
    assert_eq!(clean_reply("  \"Red Fort\".\n"), "Red Fort");
    assert_eq!(clean_reply("\n\nQutub Minar\nIt is in Mehrauli."), "Qutub Minar");
    assert_eq!(clean_reply("Landmark name: 'India Gate'"), "India Gate");
    assert_eq!(clean_reply("**Lotus Temple**"), "Lotus Temple");
    assert_eq!(clean_reply("   "), "");
}

#[test]
fn prompt_embeds_question() {
    let prompt = EntityExtractor::prompt("Which ward is the Red Fort in?");
    assert!(prompt.contains("\"Which ward is the Red Fort in?\""));
    assert!(prompt.contains("NONE"));
}

#[tokio::test]
async fn landmark_is_extracted() {
    let (_server, extractor) = extractor_replying("\"Red Fort\"").await;
    let landmark = extractor
        .extract("Which ward is the Red Fort in?")
        .expect("landmark");
    assert_eq!(landmark, "Red Fort");
}

#[tokio::test]
async fn none_reply_fails() {
    let (_server, extractor) = extractor_replying("NONE").await;
    assert!(matches!(
        extractor.extract("What is the weather like?"),
        Err(WardError::ExtractionFailed(_))
    ));
}

#[tokio::test]
async fn echoed_question_fails() {
    let (_server, extractor) = extractor_replying("Which ward is the Red Fort in").await;
    assert!(matches!(
        extractor.extract("Which ward is the Red Fort in?"),
        Err(WardError::ExtractionFailed(_))
    ));
}

#[tokio::test]
async fn model_failure_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(matches!(
        extractor_for(&server).extract("Which ward is India Gate in?"),
        Err(WardError::ExtractionFailed(_))
    ));
}

#[tokio::test]
async fn empty_question_never_calls_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(
        extractor_for(&server).extract("   "),
        Err(WardError::ExtractionFailed(_))
    ));
}
