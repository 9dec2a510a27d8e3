//! Integration tests for the mappings provider chain.
//!
//! Uses wiremock with per-mock `expect` counts to pin down exactly which
//! endpoints are contacted: priority order, first-success-wins, cache hits
//! performing zero network requests, and partial-download recovery.

use std::fs;

use animrip_core::mappings::{MappingsResolver, ProviderEndpoint};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCHEMA_BYTES: &[u8] = b"usmap-schema-body";

fn descriptor_body(server: &MockServer, file_name: &str) -> serde_json::Value {
    serde_json::json!([{
        "url": format!("{}/files/{file_name}", server.uri()),
        "fileName": file_name,
        "length": SCHEMA_BYTES.len(),
        "uploaded": "2026-08-30T12:00:00Z",
        "meta": {"version": "++Fortnite+Release-33.20", "compressionMethod": "None", "platform": "Windows"}
    }])
}

async fn mount_descriptor(server: &MockServer, endpoint: &str, file_name: &str, downloads: u64) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(descriptor_body(server, file_name)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{file_name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(SCHEMA_BYTES))
        .expect(downloads)
        .mount(server)
        .await;
}

fn provider(server: &MockServer, name: &str, endpoint: &str) -> ProviderEndpoint {
    ProviderEndpoint::new(name, format!("{}{endpoint}", server.uri()))
}

#[tokio::test]
async fn test_first_provider_success_downloads_and_caches() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    mount_descriptor(&server, "/primary/mappings", "m.usmap", 1).await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![provider(&server, "primary", "/primary/mappings")],
        data_dir.path(),
    );

    let handle = resolver.resolve().await.expect("resolve failed");
    assert_eq!(handle.file_name(), "m.usmap");
    assert_eq!(fs::read(handle.path()).unwrap(), SCHEMA_BYTES);
    assert!(!data_dir.path().join("m.usmap.part").exists());
}

#[tokio::test]
async fn test_fallback_stops_at_first_success_and_never_contacts_later_providers() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    // Provider A is down, B succeeds, C must never be contacted.
    Mock::given(method("GET"))
        .and(path("/a/mappings"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_descriptor(&server, "/b/mappings", "m.usmap", 1).await;
    Mock::given(method("GET"))
        .and(path("/c/mappings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(descriptor_body(&server, "m.usmap")))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![
            provider(&server, "a", "/a/mappings"),
            provider(&server, "b", "/b/mappings"),
            provider(&server, "c", "/c/mappings"),
        ],
        data_dir.path(),
    );

    resolver.resolve().await.expect("resolve failed");
}

#[tokio::test]
async fn test_malformed_providers_fall_through_to_valid_one() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/a/mappings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/mappings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"unexpected\": true}"))
        .mount(&server)
        .await;
    // Third provider is healthy and its file is not yet cached: exactly one
    // download, against the third provider's URL.
    mount_descriptor(&server, "/c/mappings", "m.usmap", 1).await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![
            provider(&server, "a", "/a/mappings"),
            provider(&server, "b", "/b/mappings"),
            provider(&server, "c", "/c/mappings"),
        ],
        data_dir.path(),
    );

    let handle = resolver.resolve().await.expect("resolve failed");
    assert_eq!(handle.file_name(), "m.usmap");
}

#[tokio::test]
async fn test_cached_file_skips_download_entirely() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    fs::write(data_dir.path().join("m.usmap"), SCHEMA_BYTES).unwrap();

    // Descriptor endpoint is queried, the file endpoint must not be.
    mount_descriptor(&server, "/primary/mappings", "m.usmap", 0).await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![provider(&server, "primary", "/primary/mappings")],
        data_dir.path(),
    );

    let handle = resolver.resolve().await.expect("resolve failed");
    assert_eq!(handle.file_name(), "m.usmap");
}

#[tokio::test]
async fn test_leftover_partial_file_is_not_a_cache_hit() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    // Simulate a crash mid-download on a previous run.
    fs::write(data_dir.path().join("m.usmap.part"), b"trunc").unwrap();

    mount_descriptor(&server, "/primary/mappings", "m.usmap", 1).await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![provider(&server, "primary", "/primary/mappings")],
        data_dir.path(),
    );

    let handle = resolver.resolve().await.expect("resolve failed");
    assert_eq!(fs::read(handle.path()).unwrap(), SCHEMA_BYTES);
}

#[tokio::test]
async fn test_exhausted_chain_reports_every_attempt() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/a/mappings"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/mappings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![
            provider(&server, "a", "/a/mappings"),
            provider(&server, "b", "/b/mappings"),
        ],
        data_dir.path(),
    );

    let err = resolver.resolve().await.unwrap_err();
    assert_eq!(err.attempts.len(), 2);
    assert_eq!(err.attempts[0].0, "a");
    assert_eq!(err.attempts[1].0, "b");
}

#[tokio::test]
async fn test_hash_mismatch_fails_provider_and_falls_back() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    let wrong_hash = hex::encode(Sha256::digest(b"different bytes"));
    Mock::given(method("GET"))
        .and(path("/a/mappings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "url": format!("{}/files/tampered.usmap", server.uri()),
            "fileName": "tampered.usmap",
            "hash": wrong_hash
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/tampered.usmap"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(SCHEMA_BYTES))
        .mount(&server)
        .await;
    mount_descriptor(&server, "/b/mappings", "m.usmap", 1).await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![
            provider(&server, "a", "/a/mappings"),
            provider(&server, "b", "/b/mappings"),
        ],
        data_dir.path(),
    );

    let handle = resolver.resolve().await.expect("resolve failed");
    assert_eq!(handle.file_name(), "m.usmap");
    // The tampered download never reached the cache.
    assert!(!data_dir.path().join("tampered.usmap").exists());
}

#[tokio::test]
async fn test_second_resolve_uses_cache() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    mount_descriptor(&server, "/primary/mappings", "m.usmap", 1).await;

    let resolver = MappingsResolver::new(
        reqwest::Client::new(),
        vec![provider(&server, "primary", "/primary/mappings")],
        data_dir.path(),
    );

    resolver.resolve().await.expect("first resolve failed");
    // Second call: descriptor query happens, the single allowed download
    // does not repeat.
    resolver.resolve().await.expect("second resolve failed");
}
