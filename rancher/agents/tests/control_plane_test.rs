use agent_utils::retry::RetryPolicy;
use rancher_agents::control_plane::{ApiError, HttpControlPlane};
use rancher_agents::ControlPlane;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUICK: RetryPolicy = RetryPolicy::new(3, Duration::ZERO);

/// The blocking client has to run off the async test runtime.
async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

fn url(server: &MockServer, endpoint: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), endpoint)).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_retries_until_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/schemas/amazonec2Config"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/schemas/amazonec2Config"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = url(&server, "/v1/schemas/amazonec2Config");
    let ready = blocking(move || {
        HttpControlPlane::new()
            .unwrap()
            .poll_until_ready(&url, &QUICK)
            .is_ok()
    })
    .await;
    assert!(ready);
}

#[tokio::test(flavor = "multi_thread")]
async fn redirects_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
        .expect(3)
        .mount(&server)
        .await;

    let url = url(&server, "/v1/schemas/amazonec2Config");
    let exhausted = blocking(move || {
        match HttpControlPlane::new()
            .unwrap()
            .poll_until_ready(&url, &QUICK)
        {
            Err(ApiError::Request { source, .. }) => source.is_exhausted(),
            _ => false,
        }
    })
    .await;
    assert!(exhausted);
}

#[tokio::test(flavor = "multi_thread")]
async fn post_sends_json_and_returns_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2-beta/projects/1a5/registrationtokens"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": "abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let url = url(&server, "/v2-beta/projects/1a5/registrationtokens");
    let response = blocking(move || {
        HttpControlPlane::new()
            .unwrap()
            .post(&url, &json!({}), &QUICK)
            .ok()
    })
    .await;
    assert_eq!(response, Some(json!({"token": "abc"})));
}

#[tokio::test(flavor = "multi_thread")]
async fn put_with_empty_response() {
    let server = MockServer::start().await;
    let payload = json!({"name": "api.host", "value": "http://10.0.0.1:8080"});
    Mock::given(method("PUT"))
        .and(path("/v2-beta/settings/api.host"))
        .and(body_json(payload.clone()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = url(&server, "/v2-beta/settings/api.host");
    let response = blocking(move || {
        HttpControlPlane::new()
            .unwrap()
            .request("PUT", &url, &payload, &QUICK)
            .ok()
    })
    .await;
    assert_eq!(response, Some(Value::Null));
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_method_sends_nothing() {
    let server = MockServer::start().await;
    let url = url(&server, "/v2-beta/settings/api.host");
    let unsupported = blocking(move || {
        matches!(
            HttpControlPlane::new()
                .unwrap()
                .request("DELETE", &url, &Value::Null, &QUICK),
            Err(ApiError::UnsupportedMethod { .. })
        )
    })
    .await;
    assert!(unsupported);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_exhaust_the_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let url = url(&server, "/v2-beta/projects/1a5/registrationtokens");
    let message = blocking(move || {
        HttpControlPlane::new()
            .unwrap()
            .post(&url, &json!({}), &QUICK)
            .unwrap_err()
            .to_string()
    })
    .await;
    assert!(message.contains("Exceeded max attempts 3"));
    assert!(message.contains("HTTP 500"));
}

#[tokio::test(flavor = "multi_thread")]
async fn get_returns_the_collection() {
    let server = MockServer::start().await;
    let collection = json!({
        "type": "collection",
        "data": [{"state": "active", "token": "abc"}],
    });
    Mock::given(method("GET"))
        .and(path("/v2-beta/projects/1a5/registrationtokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(collection.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let url = url(&server, "/v2-beta/projects/1a5/registrationtokens");
    let response = blocking(move || HttpControlPlane::new().unwrap().get(&url, &QUICK).ok()).await;
    assert_eq!(response, Some(collection));
}
