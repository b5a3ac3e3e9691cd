// Integration tests for `PoolSyncClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use poolsync_api::{DeviceConfigPatch, Error, PoolSyncClient, USER_HEADER, USER_HEADER_VALUE};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PoolSyncClient) {
    let server = MockServer::start().await;
    let base = url::Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = PoolSyncClient::with_client(reqwest::Client::new(), base);
    (server, client)
}

fn query_is(expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |req: &Request| req.url.query() == Some(expected)
}

fn no_authorization(req: &Request) -> bool {
    !req.headers.contains_key("authorization")
}

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

// ── Pairing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_pushlink_is_unauthenticated_put() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/poolsync"))
        .and(query_is("cmd=pushLink&start"))
        .and(header(USER_HEADER, USER_HEADER_VALUE))
        .and(no_authorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "timeRemaining": 120 })))
        .expect(1)
        .mount(&server)
        .await;

    let status = client.start_pushlink().await.unwrap();
    assert_eq!(status.time_remaining, Some(120));
    assert!(status.password().is_none());
}

#[tokio::test]
async fn test_pushlink_status_reports_credential() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/poolsync"))
        .and(query_is("cmd=pushLink&status"))
        .and(no_authorization)
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"password":"p@ss","macAddress":"AA:BB:CC:00:11:22"}"#)
                .insert_header("content-type", "text/plain"),
        )
        .mount(&server)
        .await;

    let status = client.pushlink_status().await.unwrap();
    assert_eq!(status.password(), Some("p@ss"));
    assert_eq!(status.mac_address(), Some("AA:BB:CC:00:11:22"));
}

#[tokio::test]
async fn test_pushlink_empty_body_means_nothing_yet() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/poolsync"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let status = client.pushlink_status().await.unwrap();
    assert!(status.time_remaining.is_none());
    assert!(status.password().is_none());
}

// ── Authenticated requests ──────────────────────────────────────────

#[tokio::test]
async fn test_get_all_data_sends_password_verbatim() {
    let (server, client) = setup().await;

    let body = json!({
        "poolSync": { "status": { "online": true }, "config": { "name": "Backyard" } },
        "devices": {},
        "deviceType": {}
    });

    Mock::given(method("GET"))
        .and(path("/api/poolsync"))
        .and(query_is("cmd=poolSync&all"))
        .and(header("authorization", "hunter2"))
        .and(header(USER_HEADER, USER_HEADER_VALUE))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.get_all_data(&secret("hunter2")).await.unwrap();
    assert_eq!(value, body);
}

#[tokio::test]
async fn test_patch_device_config_body_and_slot() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/api/poolsync"))
        .and(query_is("cmd=devices&device=1"))
        .and(header("authorization", "hunter2"))
        .and(body_json(json!({ "config": { "setpoint": 82 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let patch = DeviceConfigPatch::single("setpoint", 82);
    client
        .patch_device_config(&secret("hunter2"), 1, &patch)
        .await
        .unwrap();
}

// ── Error classification ────────────────────────────────────────────

#[tokio::test]
async fn test_401_is_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get_all_data(&secret("stale")).await.unwrap_err();
    assert!(err.is_unauthorized(), "got {err:?}");
}

#[tokio::test]
async fn test_403_is_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.get_all_data(&secret("stale")).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized { status: 403 }));
}

#[tokio::test]
async fn test_503_is_device_busy() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.get_all_data(&secret("pw")).await.unwrap_err();
    assert!(matches!(err, Error::DeviceBusy { status: 503 }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_404_is_plain_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&server)
        .await;

    let err = client.get_all_data(&secret("pw")).await.unwrap_err();
    match err {
        Error::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such thing");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_success_is_malformed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.get_all_data(&secret("pw")).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got {err:?}");
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let (server, client) = setup().await;
    let client = client.with_timeout(Duration::from_millis(200));

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.get_all_data(&secret("pw")).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    // Bind and drop a listener so the port is known to be closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base = url::Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
    let client = PoolSyncClient::with_client(reqwest::Client::new(), base);

    let err = client.pushlink_status().await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }), "got {err:?}");
    assert!(err.is_transient());
}
