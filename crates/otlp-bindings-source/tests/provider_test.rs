//! Integration tests for the proto source provider.
//!
//! Remote scenarios run against a local archive server so the download and
//! cache paths are exercised without network access.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;

use otlp_bindings_core::SchemaVersion;
use otlp_bindings_source::{
    LocalSource, ProtoSourceProvider, SourceConfig, SourceError, SourceOrigin,
};

const COMMON_PROTO: &str = r#"syntax = "proto3";

package opentelemetry.proto.common.v1;

message AnyValue {
  string string_value = 1;
}
"#;

// =============================================================================
// Helpers
// =============================================================================

fn release_tarball(version: &str) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    let entries = [
        (
            format!("opentelemetry-proto-{version}/opentelemetry/proto/common/v1/common.proto"),
            COMMON_PROTO,
        ),
        (
            format!("opentelemetry-proto-{version}/VERSION"),
            version,
        ),
    ];
    for (name, contents) in &entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[derive(Clone)]
struct ArchiveServer {
    hits: Arc<AtomicUsize>,
}

async fn serve_archive(
    State(server): State<ArchiveServer>,
    UrlPath(file): UrlPath<String>,
) -> Result<Vec<u8>, StatusCode> {
    server.hits.fetch_add(1, Ordering::SeqCst);
    let version = file
        .strip_prefix('v')
        .and_then(|f| f.strip_suffix(".tar.gz"))
        .ok_or(StatusCode::NOT_FOUND)?;
    if version == "9.9.9" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(release_tarball(version))
}

async fn spawn_archive_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/archive/:file", get(serve_archive))
        .with_state(ArchiveServer { hits: hits.clone() });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn write_checkout(dir: &Path, version_file: Option<&str>) {
    let proto_dir = dir.join("opentelemetry/proto/common/v1");
    std::fs::create_dir_all(&proto_dir).unwrap();
    std::fs::write(proto_dir.join("common.proto"), COMMON_PROTO).unwrap();
    if let Some(version) = version_file {
        std::fs::write(dir.join("VERSION"), version).unwrap();
    }
}

// =============================================================================
// Remote Sources
// =============================================================================

#[tokio::test]
async fn test_download_is_cached_between_runs() {
    let (addr, hits) = spawn_archive_server().await;
    let work = tempfile::tempdir().unwrap();
    let config = SourceConfig::new(work.path())
        .with_archive_url_template(format!("http://{addr}/archive/v{{version}}.tar.gz"));
    let provider = ProtoSourceProvider::new(config).unwrap();
    let version = SchemaVersion::new(1, 0, 0);

    let first = provider.provide(&version).await.unwrap();
    assert!(matches!(first.origin, SourceOrigin::DownloadedArchive(_)));
    assert!(first
        .root
        .join("opentelemetry/proto/common/v1/common.proto")
        .exists());

    let second = provider.provide(&version).await.unwrap();
    assert!(matches!(second.origin, SourceOrigin::CachedArchive(_)));
    assert_eq!(second.root, first.root);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_archive_skips_network() {
    let work = tempfile::tempdir().unwrap();
    let archives = work.path().join("archives");
    std::fs::create_dir_all(&archives).unwrap();
    std::fs::write(
        archives.join("opentelemetry-proto-1.1.0.tar.gz"),
        release_tarball("1.1.0"),
    )
    .unwrap();

    // Port 9 (discard) is not listening; a download attempt would fail.
    let config = SourceConfig::new(work.path())
        .with_archive_url_template("http://127.0.0.1:9/v{version}.tar.gz");
    let provider = ProtoSourceProvider::new(config).unwrap();

    let sources = provider.provide(&SchemaVersion::new(1, 1, 0)).await.unwrap();
    assert!(matches!(sources.origin, SourceOrigin::CachedArchive(_)));
}

#[tokio::test]
async fn test_missing_release_reports_status() {
    let (addr, _) = spawn_archive_server().await;
    let work = tempfile::tempdir().unwrap();
    let config = SourceConfig::new(work.path())
        .with_archive_url_template(format!("http://{addr}/archive/v{{version}}.tar.gz"));
    let provider = ProtoSourceProvider::new(config).unwrap();

    let err = provider
        .provide(&SchemaVersion::new(9, 9, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::HttpStatus { status: 404, .. }));
    assert!(provider
        .cache()
        .get(&SchemaVersion::new(9, 9, 9))
        .unwrap()
        .is_none());
}

// =============================================================================
// Local Sources
// =============================================================================

#[tokio::test]
async fn test_local_checkout_is_copied() {
    let checkout = tempfile::tempdir().unwrap();
    write_checkout(checkout.path(), Some("1.0.0"));
    let work = tempfile::tempdir().unwrap();

    let config =
        SourceConfig::new(work.path()).with_local(LocalSource::new(checkout.path()));
    let provider = ProtoSourceProvider::new(config).unwrap();

    let sources = provider.provide(&SchemaVersion::new(1, 0, 0)).await.unwrap();
    assert_eq!(
        sources.origin,
        SourceOrigin::Local(checkout.path().to_path_buf())
    );
    assert_eq!(
        sources.root,
        work.path().join("protos/opentelemetry-proto-1.0.0")
    );
    assert!(sources
        .root
        .join("opentelemetry/proto/common/v1/common.proto")
        .exists());
}

#[tokio::test]
async fn test_local_version_mismatch_is_rejected() {
    let checkout = tempfile::tempdir().unwrap();
    write_checkout(checkout.path(), Some("0.19.0"));
    let work = tempfile::tempdir().unwrap();

    let config =
        SourceConfig::new(work.path()).with_local(LocalSource::new(checkout.path()));
    let provider = ProtoSourceProvider::new(config).unwrap();

    let err = provider
        .provide(&SchemaVersion::new(1, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::VersionMismatch { .. }));
    assert!(!work.path().join("protos/opentelemetry-proto-1.0.0").exists());
}

#[tokio::test]
async fn test_local_check_can_be_disabled() {
    let checkout = tempfile::tempdir().unwrap();
    write_checkout(checkout.path(), None);
    let work = tempfile::tempdir().unwrap();

    let config = SourceConfig::new(work.path())
        .with_local(LocalSource::new(checkout.path()).without_version_check());
    let provider = ProtoSourceProvider::new(config).unwrap();

    assert!(provider.provide(&SchemaVersion::new(1, 0, 0)).await.is_ok());
}

#[tokio::test]
async fn test_missing_local_checkout() {
    let work = tempfile::tempdir().unwrap();
    let config = SourceConfig::new(work.path())
        .with_local(LocalSource::new(work.path().join("does-not-exist")));
    let provider = ProtoSourceProvider::new(config).unwrap();

    let err = provider
        .provide(&SchemaVersion::new(1, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::MissingLocalSource { .. }));
}

#[tokio::test]
async fn test_work_dir_inside_checkout_is_skipped() {
    let checkout = tempfile::tempdir().unwrap();
    write_checkout(checkout.path(), Some("1.0.0"));
    let work_dir = checkout.path().join("build");

    let config = SourceConfig::new(&work_dir).with_local(LocalSource::new(checkout.path()));
    let provider = ProtoSourceProvider::new(config).unwrap();

    let sources = provider.provide(&SchemaVersion::new(1, 0, 0)).await.unwrap();
    assert!(sources
        .root
        .join("opentelemetry/proto/common/v1/common.proto")
        .exists());
    assert!(!sources.root.join("build").exists());

    // A second run must not pick up the first run's copy either.
    let sources = provider.provide(&SchemaVersion::new(1, 0, 0)).await.unwrap();
    assert!(!sources.root.join("build").exists());
}

#[tokio::test]
async fn test_checkout_inside_proto_output_is_rejected() {
    let work = tempfile::tempdir().unwrap();
    let checkout = work.path().join("protos/opentelemetry-proto-1.0.0");
    write_checkout(&checkout, Some("1.0.0"));

    let config = SourceConfig::new(work.path()).with_local(LocalSource::new(&checkout));
    let provider = ProtoSourceProvider::new(config).unwrap();

    let err = provider
        .provide(&SchemaVersion::new(1, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::OverlappingLocalSource { .. }));
    assert!(checkout
        .join("opentelemetry/proto/common/v1/common.proto")
        .exists());
}
