//! Integration tests against a fake Cargo registry.
//!
//! The fake registry implements the publish and version endpoints of the
//! registry web API on a local port. Uploaded versions become visible only
//! after a configurable number of status polls.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use otlp_bindings_core::LibraryArtifact;
use otlp_bindings_publish::{
    await_release, decode_publish_body, PublishError, Publisher, RegistryAuth, RegistryClient, RegistryConfig,
    RetryPolicy, VersionStatus,
};

const TOKEN: &str = "cio_test_token";

// =============================================================================
// Fake Registry
// =============================================================================

#[derive(Default)]
struct Registry {
    published: HashSet<(String, String)>,
    polls: u32,
    uploads: u32,
    /// Polls answered with 404 before a published version becomes visible.
    hidden_polls: u32,
}

type Shared = Arc<Mutex<Registry>>;

async fn publish(
    State(registry): State<Shared>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(TOKEN) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"errors": [{"detail": "invalid token"}]})),
        );
    }

    let Ok((meta, crate_bytes)) = decode_publish_body(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"errors": [{"detail": "malformed body"}]})),
        );
    };
    assert!(!crate_bytes.is_empty());

    let mut registry = registry.lock().unwrap();
    registry.uploads += 1;
    if !registry.published.insert((meta.name.clone(), meta.vers.clone())) {
        return (
            StatusCode::OK,
            Json(json!({"errors": [{"detail": format!("crate version `{}` is already uploaded", meta.vers)}]})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({"warnings": {"invalid_categories": [], "invalid_badges": [], "other": []}})),
    )
}

async fn version(
    State(registry): State<Shared>,
    Path((name, version)): Path<(String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let mut registry = registry.lock().unwrap();
    registry.polls += 1;

    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": [{"detail": "authentication required"}]})),
        );
    }

    let visible = registry.published.contains(&(name, version.clone()))
        && registry.polls > registry.hidden_polls;
    if visible {
        (
            StatusCode::OK,
            Json(json!({"version": {"num": version, "yanked": false}})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"errors": [{"detail": "Not Found"}]})),
        )
    }
}

async fn spawn_registry(hidden_polls: u32) -> (SocketAddr, Shared) {
    let state: Shared = Arc::new(Mutex::new(Registry {
        hidden_polls,
        ..Registry::default()
    }));
    let app = Router::new()
        .route("/api/v1/crates/new", put(publish))
        .route("/api/v1/crates/:name/:version", get(version))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

// =============================================================================
// Helpers
// =============================================================================

fn artifact() -> LibraryArtifact {
    LibraryArtifact::builder("opentelemetry-proto-bindings")
        .version("1.0.0")
        .add_file(
            "Cargo.toml",
            "[package]\nname = \"opentelemetry-proto-bindings\"\nversion = \"1.0.0\"\n",
        )
        .add_file("src/lib.rs", "pub mod opentelemetry {}\n")
        .build()
        .unwrap()
}

fn target(name: &str, addr: SocketAddr) -> RegistryConfig {
    RegistryConfig::new(name, format!("http://{addr}"))
        .allow_insecure()
        .with_auth(RegistryAuth::token(TOKEN))
        .with_timeout(Duration::from_secs(5))
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(5))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_publish_waits_for_release() {
    let (addr, state) = spawn_registry(2).await;
    let publisher = Publisher::new(vec![target("public", addr)], fast_retry(10)).unwrap();

    let outcomes = publisher.publish(&artifact()).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].release_attempts, Some(3));
    assert!(outcomes[0].warnings.is_empty());
    assert_eq!(state.lock().unwrap().polls, 3);
}

#[tokio::test]
async fn test_unverified_target_is_not_polled() {
    let (addr, state) = spawn_registry(0).await;
    let primary = target("primary", addr).with_release_verification(false);
    let publisher = Publisher::new(vec![primary], fast_retry(10)).unwrap();

    let outcomes = publisher.publish(&artifact()).await.unwrap();

    assert_eq!(outcomes[0].release_attempts, None);
    assert_eq!(state.lock().unwrap().polls, 0);
}

#[tokio::test]
async fn test_release_timeout_after_max_attempts() {
    let (addr, state) = spawn_registry(u32::MAX).await;
    let publisher = Publisher::new(vec![target("public", addr)], fast_retry(3)).unwrap();

    let err = publisher.publish(&artifact()).await.unwrap_err();

    assert!(matches!(
        err,
        PublishError::ReleaseTimeout { attempts: 3, .. }
    ));
    assert_eq!(state.lock().unwrap().polls, 3);
}

#[tokio::test]
async fn test_targets_published_in_order() {
    let (primary_addr, primary) = spawn_registry(0).await;
    let (public_addr, public) = spawn_registry(0).await;
    let targets = vec![
        target("primary", primary_addr).with_release_verification(false),
        target("public", public_addr),
    ];
    let publisher = Publisher::new(targets, fast_retry(5)).unwrap();

    let outcomes = publisher.publish(&artifact()).await.unwrap();

    let names: Vec<_> = outcomes.iter().map(|o| o.registry.as_str()).collect();
    assert_eq!(names, ["primary", "public"]);
    assert_eq!(primary.lock().unwrap().uploads, 1);
    assert_eq!(public.lock().unwrap().uploads, 1);
}

#[tokio::test]
async fn test_duplicate_upload_rejected() {
    let (addr, _) = spawn_registry(0).await;
    let client = RegistryClient::new(target("public", addr)).unwrap();

    client.publish(&artifact()).await.unwrap();
    let err = client.publish(&artifact()).await.unwrap_err();

    assert!(matches!(
        err,
        PublishError::Rejected { ref message, .. } if message.contains("already uploaded")
    ));
}

#[tokio::test]
async fn test_bad_token_fails_authentication() {
    let (addr, state) = spawn_registry(0).await;
    let config = target("public", addr).with_auth(RegistryAuth::token("wrong"));
    let client = RegistryClient::new(config).unwrap();

    let err = client.publish(&artifact()).await.unwrap_err();

    assert!(matches!(err, PublishError::AuthenticationFailed { .. }));
    assert_eq!(state.lock().unwrap().uploads, 0);
}

#[tokio::test]
async fn test_version_status() {
    let (addr, _) = spawn_registry(0).await;
    let client = RegistryClient::new(target("public", addr)).unwrap();

    assert_eq!(
        client
            .version_status("opentelemetry-proto-bindings", "1.0.0")
            .await
            .unwrap(),
        VersionStatus::Missing
    );
    client.publish(&artifact()).await.unwrap();
    assert_eq!(
        client
            .version_status("opentelemetry-proto-bindings", "1.0.0")
            .await
            .unwrap(),
        VersionStatus::Available
    );
}

#[tokio::test]
async fn test_rejected_status_poll_fails_fast() {
    let (addr, state) = spawn_registry(0).await;
    RegistryClient::new(target("public", addr))
        .unwrap()
        .publish(&artifact())
        .await
        .unwrap();

    let config = target("public", addr).with_auth(RegistryAuth::token("wrong"));
    let client = RegistryClient::new(config).unwrap();
    let slow = RetryPolicy::new(50, Duration::from_secs(10));

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        await_release(&client, "opentelemetry-proto-bindings", "1.0.0", &slow),
    )
    .await
    .expect("a rejected poll must not be retried")
    .unwrap_err();

    assert!(matches!(err, PublishError::AuthenticationFailed { .. }));
    assert_eq!(state.lock().unwrap().polls, 1);
}
