use super::*;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client() -> HttpClient {
    HttpClient::new(&HttpConfig::default())
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(3)
        .with_backoff_unit(Duration::from_millis(5))
}

#[test]
fn client_configuration() {
    let client = HttpClient::new(&HttpConfig {
        timeout_seconds: 12,
        retry_attempts: 4,
    });
    assert_eq!(client.retry_attempts(), 4);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts(), 1, "at least one attempt is always made");
}

#[test]
fn retryable_classification() {
    assert!(is_retryable(&ureq::Error::StatusCode(503)));
    assert!(is_retryable(&ureq::Error::ConnectionFailed));
    assert!(!is_retryable(&ureq::Error::StatusCode(404)));
    assert!(!is_retryable(&ureq::Error::StatusCode(400)));
}

#[tokio::test]
async fn get_sends_query_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Red Fort, Delhi, India"))
        .and(query_param("format", "jsonv2"))
        .and(header("User-Agent", "ward-rag-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/search", server.uri());
    let body = test_client()
        .get_text(
            &url,
            &[("q", "Red Fort, Delhi, India"), ("format", "jsonv2")],
            "ward-rag-test",
        )
        .expect("request should succeed");

    assert_eq!(body, "[]");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(serde_json::json!({"ping": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .mount(&server)
        .await;

    let url = format!("{}/api/chat", server.uri());
    let body = test_client()
        .post_json(&url, r#"{"ping":true}"#)
        .expect("third attempt should succeed");

    assert_eq!(body, "{\"ok\":true}");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let error = test_client()
        .get_text(&url, &[], "ward-rag-test")
        .expect_err("404 should fail");

    assert!(error.to_string().contains("404"));
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result = test_client().get_text(&server.uri(), &[], "ward-rag-test");
    assert!(result.is_err());
}
