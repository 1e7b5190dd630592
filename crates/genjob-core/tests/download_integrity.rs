//! Integration test: artifact downloads over HTTP against a local fake server.
//!
//! A truncated first response must be retried, never leave partial data at the
//! destination, and the final file must match the served body.

mod common;

use std::time::Duration;

use common::fake_server::{FakeServer, Reply};
use genjob_core::download::Downloader;
use genjob_core::job::ArtifactRef;
use genjob_core::retry::RetryPolicy;
use genjob_core::storage::temp_path;
use genjob_core::JobError;
use tempfile::tempdir;

fn downloader() -> Downloader {
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        ..RetryPolicy::default()
    };
    Downloader::new(reqwest::Client::new(), policy)
}

#[tokio::test]
async fn truncated_transfer_is_retried_and_file_matches() {
    let body: Vec<u8> = (0u8..100).cycle().take(64 * 1024).collect();
    let server = FakeServer::start();
    server.route(
        "GET",
        "/files/clip.mp4",
        vec![Reply::bytes(body.clone()).truncated(1000), Reply::bytes(body.clone())],
    );

    let dir = tempdir().unwrap();
    let dest = dir.path().join("videos/clip.mp4");
    let artifact = ArtifactRef::new(format!("{}/files/clip.mp4", server.url()));
    let got = downloader().download(&artifact, &dest).await.expect("download");

    assert_eq!(server.count("GET", "/files/clip.mp4"), 2);
    assert_eq!(got.byte_size, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(!temp_path(&dest).exists(), "no .part file may remain");
}

#[tokio::test]
async fn truncated_every_time_leaves_no_destination() {
    let body = vec![7u8; 10_000];
    let server = FakeServer::start();
    server.route("GET", "/files/a.bin", vec![Reply::bytes(body).truncated(10)]);

    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.bin");
    let artifact = ArtifactRef::new(format!("{}/files/a.bin", server.url()));
    let err = downloader().download(&artifact, &dest).await.unwrap_err();

    assert!(genjob_core::retry::is_retryable(&err), "got {err:?}");
    assert_eq!(server.count("GET", "/files/a.bin"), 3);
    assert!(!dest.exists());
    assert!(!temp_path(&dest).exists());
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = FakeServer::start();
    server.route("GET", "/files/", vec![Reply::json(404, r#"{"error":{"message":"expired"}}"#)]);

    let dir = tempdir().unwrap();
    let dest = dir.path().join("gone.mp4");
    let artifact = ArtifactRef::new(format!("{}/files/gone.mp4", server.url()));
    let err = downloader().download(&artifact, &dest).await.unwrap_err();

    assert!(matches!(err, JobError::Http { status: 404, ref message } if message == "expired"));
    assert_eq!(server.count("GET", "/files/"), 1);
    assert!(!dest.exists());
}

#[tokio::test]
async fn service_unavailable_is_retried_and_auth_headers_are_sent() {
    let server = FakeServer::start();
    server.route(
        "GET",
        "/content",
        vec![
            Reply::json(503, r#"{"message":"service unavailable"}"#),
            Reply::bytes(b"ID3 audio".to_vec()),
        ],
    );

    let dir = tempdir().unwrap();
    let dest = dir.path().join("voice.mp3");
    let artifact = ArtifactRef::new(format!("{}/content", server.url()))
        .with_header("x-goog-api-key", "g-key");
    let got = downloader().download(&artifact, &dest).await.unwrap();

    assert_eq!(got.byte_size, 9);
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.header("x-goog-api-key") == Some("g-key")));
}
