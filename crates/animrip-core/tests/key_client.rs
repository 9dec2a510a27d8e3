//! Integration tests for KeyClient against a mocked key service.

use animrip_core::error::KeyFetchError;
use animrip_core::keys::KeyClient;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MAIN_KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
const DYN_KEY: &str = "0x00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
const DYN_GUID: &str = "41f04c0f9a2340dbb34a73f8d9e7b6cd";

fn key_client(server: &MockServer) -> KeyClient {
    KeyClient::new(reqwest::Client::new(), format!("{}/api/v1/aes", server.uri()))
}

#[tokio::test]
async fn test_fetch_keys_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/aes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "++Fortnite+Release-33.20",
            "mainKey": MAIN_KEY,
            "dynamicKeys": [
                {"name": "pakchunk1000-optional", "guid": DYN_GUID, "key": DYN_KEY}
            ]
        })))
        .mount(&server)
        .await;

    let keys = key_client(&server).fetch_keys().await.expect("fetch failed");
    assert_eq!(keys.len(), 2);
    assert!(keys.has_group(Uuid::parse_str(DYN_GUID).unwrap()));
    assert!(keys.key_for_group(Uuid::nil()).is_some());
}

#[tokio::test]
async fn test_fetch_keys_skips_malformed_dynamic_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/aes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "mainKey": MAIN_KEY,
            "dynamicKeys": [
                {"name": "broken", "guid": "zz-not-a-guid", "key": DYN_KEY},
                {"name": "fine", "guid": DYN_GUID, "key": DYN_KEY}
            ]
        })))
        .mount(&server)
        .await;

    let keys = key_client(&server).fetch_keys().await.expect("fetch failed");
    assert_eq!(keys.dynamic_count(), 1);
}

#[tokio::test]
async fn test_fetch_keys_non_2xx_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/aes"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = key_client(&server).fetch_keys().await.unwrap_err();
    assert!(matches!(err, KeyFetchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_fetch_keys_garbage_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/aes"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>down</html>"))
        .mount(&server)
        .await;

    let err = key_client(&server).fetch_keys().await.unwrap_err();
    assert!(matches!(err, KeyFetchError::Parse { .. }));
}

#[tokio::test]
async fn test_fetch_keys_without_primary_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/aes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "dynamicKeys": [
                {"name": "fine", "guid": DYN_GUID, "key": DYN_KEY}
            ]
        })))
        .mount(&server)
        .await;

    let err = key_client(&server).fetch_keys().await.unwrap_err();
    assert!(matches!(err, KeyFetchError::MissingPrimary { .. }));
}

#[tokio::test]
async fn test_fetch_keys_unreachable_endpoint_is_network_error() {
    // Nothing is listening on this port.
    let client = KeyClient::new(
        reqwest::Client::new(),
        "http://127.0.0.1:9/api/v1/aes".to_string(),
    );
    let err = client.fetch_keys().await.unwrap_err();
    assert!(matches!(err, KeyFetchError::Network { .. }));
}
