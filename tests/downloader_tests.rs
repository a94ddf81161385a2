//! Integration tests for chunked materialization
//!
//! These run the real downloader against the in-memory service and CDN:
//! preallocation, out-of-order chunk writes, the retry ceiling and manifest
//! server failover.

mod common;

use std::path::Path;

use depot_fetcher::app::{ChunkProgress, ContentVersion, DownloaderConfig};
use depot_fetcher::errors::{DownloadError, ManifestError};
use tempfile::TempDir;
use tokio::sync::mpsc;

use common::{sample_bytes, DepotFixture, Harness, APP_ID, DEPOT_ID};

fn version(manifest_id: u64) -> ContentVersion {
    ContentVersion::new(APP_ID, DEPOT_ID, "public", manifest_id)
}

fn standard_fixture() -> DepotFixture {
    DepotFixture::build(
        555,
        &[
            ("a.bin", sample_bytes(10, 1)),
            ("game/data/pak0.bin", sample_bytes(10_000, 2)),
            ("empty.txt", Vec::new()),
        ],
        5,
    )
    .with_metadata_entry("game/saves", 4096)
}

fn assert_contents(root: &Path, fixture: &DepotFixture) {
    for (path, expected) in &fixture.contents {
        let full = root.join(path);
        if expected.is_empty() {
            assert!(!full.exists(), "{} should not be created", path.display());
            continue;
        }
        let actual = std::fs::read(&full).unwrap();
        assert_eq!(actual.len(), expected.len(), "size of {}", path.display());
        assert_eq!(&actual, expected, "contents of {}", path.display());
    }
}

#[tokio::test]
async fn test_materialize_reconstructs_files() {
    let harness = Harness::new(3);
    let fixture = standard_fixture();
    harness.publish("public", &fixture);
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("public");

    let summary = harness
        .engine
        .materialize(&dest, &version(555))
        .await
        .unwrap();

    assert_contents(&dest, &fixture);
    assert!(!dest.join("game").join("saves").exists());
    assert_eq!(summary.files_written, 2);
    assert_eq!(summary.files_skipped, 2);
    assert_eq!(summary.chunks_written, fixture.chunks.len() as u64);
    assert_eq!(summary.bytes_written, 10_010);
    assert_eq!(summary.retries, 0);
}

#[tokio::test]
async fn test_two_chunk_file_regardless_of_order() {
    let harness = Harness::with_config(1, DownloaderConfig::default().with_workers(1));
    let data = sample_bytes(10, 7);
    let fixture = DepotFixture::build(600, &[("a.bin", data.clone())], 5).with_reversed_chunks();
    assert_eq!(fixture.manifest.files[0].chunks[0].offset, 5);
    harness.publish("public", &fixture);
    let temp_dir = TempDir::new().unwrap();

    harness
        .engine
        .materialize(temp_dir.path(), &version(600))
        .await
        .unwrap();

    let written = std::fs::read(temp_dir.path().join("a.bin")).unwrap();
    assert_eq!(written.len(), 10);
    assert_eq!(written, data);
}

#[tokio::test]
async fn test_rerun_into_cleared_destination_is_identical() {
    let harness = Harness::new(4);
    let fixture = standard_fixture();
    harness.publish("public", &fixture);
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("public");

    harness
        .engine
        .materialize(&dest, &version(555))
        .await
        .unwrap();
    let first = std::fs::read(dest.join("game").join("data").join("pak0.bin")).unwrap();

    std::fs::remove_dir_all(&dest).unwrap();
    harness
        .engine
        .materialize(&dest, &version(555))
        .await
        .unwrap();
    let second = std::fs::read(dest.join("game").join("data").join("pak0.bin")).unwrap();

    assert_eq!(first, second);
    assert_contents(&dest, &fixture);
}

#[tokio::test]
async fn test_existing_longer_file_is_resized() {
    let harness = Harness::new(2);
    let fixture = DepotFixture::build(700, &[("a.bin", sample_bytes(10, 3))], 4);
    harness.publish("public", &fixture);
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("a.bin"), vec![0xFF; 64]).unwrap();

    harness
        .engine
        .materialize(temp_dir.path(), &version(700))
        .await
        .unwrap();

    assert_contents(temp_dir.path(), &fixture);
}

#[tokio::test]
async fn test_chunk_failing_eight_times_then_succeeding() {
    let harness = Harness::new(3);
    let fixture = DepotFixture::build(800, &[("a.bin", sample_bytes(10, 4))], 5);
    harness.publish("public", &fixture);
    harness.cdn.fail_chunk(fixture.chunk_ids()[0], 8);
    let temp_dir = TempDir::new().unwrap();

    let summary = harness
        .engine
        .materialize(temp_dir.path(), &version(800))
        .await
        .unwrap();

    assert_eq!(summary.retries, 8);
    assert_contents(temp_dir.path(), &fixture);
}

#[tokio::test]
async fn test_chunk_failing_nine_times_aborts() {
    let harness = Harness::new(3);
    let fixture = DepotFixture::build(801, &[("a.bin", sample_bytes(10, 5))], 5);
    harness.publish("public", &fixture);
    let failing = fixture.chunk_ids()[1];
    harness.cdn.fail_chunk(failing, 9);
    let temp_dir = TempDir::new().unwrap();

    let result = harness
        .engine
        .materialize(temp_dir.path(), &version(801))
        .await;

    match result {
        Err(DownloadError::RetriesExhausted {
            chunk_id, attempts, ..
        }) => {
            assert_eq!(chunk_id, failing.to_hex());
            assert_eq!(attempts, 9);
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_chunk_exhausts_retries() {
    let config = DownloaderConfig {
        max_chunk_retries: 2,
        ..Default::default()
    };
    let harness = Harness::with_config(2, config);
    let fixture = DepotFixture::build(802, &[("a.bin", sample_bytes(32, 6))], 8);
    harness.publish("public", &fixture);
    harness.cdn.corrupt_chunk(fixture.chunk_ids()[2]);
    let temp_dir = TempDir::new().unwrap();

    let result = harness
        .engine
        .materialize(temp_dir.path(), &version(802))
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::RetriesExhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn test_manifest_from_third_server() {
    let harness = Harness::new(3);
    let fixture = DepotFixture::build(900, &[("a.bin", sample_bytes(10, 8))], 5);
    harness.publish("public", &fixture);
    harness.cdn.fail_host("cdn0.test");
    harness.cdn.fail_host("cdn1.test");
    let temp_dir = TempDir::new().unwrap();

    harness
        .engine
        .materialize(temp_dir.path(), &version(900))
        .await
        .unwrap();

    assert_eq!(
        harness.cdn.manifest_hosts(),
        vec!["cdn0.test", "cdn1.test", "cdn2.test"]
    );
    assert_contents(temp_dir.path(), &fixture);
}

#[tokio::test]
async fn test_manifest_unavailable_downloads_no_chunks() {
    let harness = Harness::new(3);
    let fixture = DepotFixture::build(901, &[("a.bin", sample_bytes(10, 9))], 5);
    harness.publish("public", &fixture);
    for host in ["cdn0.test", "cdn1.test", "cdn2.test"] {
        harness.cdn.fail_host(host);
    }
    let temp_dir = TempDir::new().unwrap();

    let result = harness
        .engine
        .materialize(temp_dir.path(), &version(901))
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Manifest(ManifestError::Unavailable {
            manifest_id: 901,
            attempts: 3,
            ..
        }))
    ));
    assert_eq!(harness.cdn.chunk_requests(), 0);
    assert!(!temp_dir.path().join("a.bin").exists());
}

#[tokio::test]
async fn test_no_servers() {
    let harness = Harness::new(0);
    let temp_dir = TempDir::new().unwrap();

    let result = harness
        .engine
        .materialize(temp_dir.path(), &version(1))
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::NoServers { depot_id: DEPOT_ID })
    ));
}

#[tokio::test]
async fn test_many_chunks_many_workers() {
    let harness = Harness::new(12);
    let files: Vec<(String, Vec<u8>)> = (0..8)
        .map(|i| (format!("dir{}/file{}.bin", i % 3, i), sample_bytes(4096 + i * 17, i as u8)))
        .collect();
    let borrowed: Vec<(&str, Vec<u8>)> = files
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    let fixture = DepotFixture::build(1000, &borrowed, 256);
    harness.publish("public", &fixture);
    for id in fixture.chunk_ids().into_iter().step_by(7) {
        harness.cdn.fail_chunk(id, 2);
    }
    let temp_dir = TempDir::new().unwrap();

    let summary = harness
        .engine
        .materialize(temp_dir.path(), &version(1000))
        .await
        .unwrap();

    assert_contents(temp_dir.path(), &fixture);
    assert_eq!(summary.files_written, 8);
    assert!(summary.retries > 0);
}

#[tokio::test]
async fn test_progress_events() {
    let harness = Harness::new(2);
    let fixture = DepotFixture::build(1100, &[("a.bin", sample_bytes(40, 10))], 10);
    harness.publish("public", &fixture);
    harness.cdn.fail_chunk(fixture.chunk_ids()[0], 1);
    let temp_dir = TempDir::new().unwrap();
    let (tx, mut rx) = mpsc::channel(64);

    harness
        .engine
        .materialize_with_progress(temp_dir.path(), &version(1100), tx)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(
        events[0],
        ChunkProgress::Started {
            total_chunks: 4,
            total_bytes: 40
        }
    );
    let written = events
        .iter()
        .filter(|e| matches!(e, ChunkProgress::Written { .. }))
        .count();
    let retried = events
        .iter()
        .filter(|e| matches!(e, ChunkProgress::Retrying { attempts: 1, .. }))
        .count();
    assert_eq!(written, 4);
    assert_eq!(retried, 1);
}

#[tokio::test]
async fn test_depot_key_fetched_once_per_depot() {
    let harness = Harness::new(2);
    let fixture = DepotFixture::build(1200, &[("a.bin", sample_bytes(10, 11))], 5);
    harness.publish("public", &fixture);
    let temp_dir = TempDir::new().unwrap();

    for _ in 0..2 {
        harness
            .engine
            .materialize(temp_dir.path(), &version(1200))
            .await
            .unwrap();
    }

    assert_eq!(
        harness
            .service
            .state
            .depot_key_requests
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}
