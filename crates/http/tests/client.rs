//! Outbound client behavior against a live mock server.

use std::time::Duration;

use indexmap::IndexMap;
use vigil_http::{AuthSpec, HttpClient, HttpMethod, RequestSpec, RetryConfig};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn spec(url: String) -> RequestSpec {
    RequestSpec {
        url,
        method: HttpMethod::Post,
        headers: IndexMap::new(),
        body: Some(r#"{"ping": true}"#.to_owned()),
        auth: AuthSpec::None,
        timeout: Duration::from_secs(5),
        retry: None,
    }
}

// The mock server listens on loopback, so every test also exercises the
// allow-private escape hatch of the SSRF guard.
fn client() -> HttpClient {
    HttpClient::new(true)
}

#[tokio::test]
async fn captures_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .mount(&server)
        .await;

    let captured = client()
        .execute(&spec(format!("{}/hook", server.uri())))
        .await
        .expect("call succeeds");

    assert!(captured.is_success());
    assert_eq!(captured.status, 200);
    assert_eq!(captured.body_preview, "accepted");
    assert_eq!(captured.attempts, 1);
}

#[tokio::test]
async fn retries_on_5xx_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let mut request = spec(format!("{}/flaky", server.uri()));
    request.retry = Some(RetryConfig {
        attempts: 4,
        initial_delay_ms: 100,
        jitter: false,
    });

    let captured = client().execute(&request).await.expect("eventual success");
    assert_eq!(captured.status, 201);
    assert_eq!(captured.attempts, 3);
}

#[tokio::test]
async fn terminal_4xx_is_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = spec(format!("{}/nope", server.uri()));
    request.retry = Some(RetryConfig {
        attempts: 3,
        initial_delay_ms: 100,
        jitter: false,
    });

    let captured = client().execute(&request).await.expect("terminal response");
    assert_eq!(captured.status, 404);
    assert_eq!(captured.attempts, 1);
    assert_eq!(captured.body_preview, "missing");
}

#[tokio::test]
async fn exhausted_retries_return_the_final_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("still down"))
        .expect(2)
        .mount(&server)
        .await;

    let mut request = spec(format!("{}/down", server.uri()));
    request.retry = Some(RetryConfig {
        attempts: 2,
        initial_delay_ms: 100,
        jitter: false,
    });

    // Transport kept working, so the caller gets the last upstream
    // answer rather than an Exhausted error.
    let captured = client().execute(&request).await.unwrap();
    assert_eq!(captured.status, 500);
    assert_eq!(captured.attempts, 2);
    assert_eq!(captured.body_preview, "still down");
}

#[tokio::test]
async fn connection_failures_exhaust_into_an_error() {
    // A port nobody listens on: every attempt is a transport failure.
    let mut request = spec("http://127.0.0.1:1/unreachable".into());
    request.retry = Some(RetryConfig {
        attempts: 2,
        initial_delay_ms: 100,
        jitter: false,
    });

    let err = client().execute(&request).await.unwrap_err();
    assert!(err.to_string().contains("after 2 attempt"));
}

#[tokio::test]
async fn bearer_and_basic_auth_set_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bearer"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/basic"))
        // base64("user:pass")
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut bearer = spec(format!("{}/bearer", server.uri()));
    bearer.auth = AuthSpec::Bearer {
        token: "secret-token".into(),
    };
    assert!(client().execute(&bearer).await.unwrap().is_success());

    let mut basic = spec(format!("{}/basic", server.uri()));
    basic.auth = AuthSpec::Basic {
        username: "user".into(),
        password: "pass".into(),
    };
    assert!(client().execute(&basic).await.unwrap().is_success());
}

#[tokio::test]
async fn oauth2_fetches_token_once_and_caches_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "cached-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .and(header("authorization", "Bearer cached-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = client();
    let mut request = spec(format!("{}/api", server.uri()));
    request.auth = AuthSpec::Oauth2 {
        token_url: format!("{}/token", server.uri()),
        client_id: "cid".into(),
        client_secret: "secret".into(),
    };

    // Two calls, one token fetch.
    assert!(client.execute(&request).await.unwrap().is_success());
    assert!(client.execute(&request).await.unwrap().is_success());
}

#[tokio::test]
async fn custom_headers_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/custom"))
        .and(header("x-api-key", "k-123"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut request = spec(format!("{}/custom", server.uri()));
    let mut headers = IndexMap::new();
    headers.insert("x-api-key".to_owned(), "k-123".to_owned());
    request.auth = AuthSpec::Custom { headers };

    assert!(client().execute(&request).await.unwrap().is_success());
}

#[tokio::test]
async fn private_targets_are_rejected_before_connecting() {
    let strict = HttpClient::new(false);
    let err = strict
        .execute(&spec("http://127.0.0.1:1/unreachable".into()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("blocked url"));
}
