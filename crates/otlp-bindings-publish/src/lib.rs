//! # OTLP Bindings Publish
//!
//! Uploads the packaged bindings crate to one or more Cargo registries.
//!
//! Each target has its own URL, credentials and timeouts. Targets that verify
//! releases are polled after upload until the version is available, with a
//! fixed-delay [`RetryPolicy`] capped at a maximum number of attempts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use otlp_bindings_core::LibraryArtifact;
//! use otlp_bindings_publish::{Publisher, RegistryAuth, RegistryConfig, RetryPolicy};
//!
//! # async fn run(artifact: LibraryArtifact) -> otlp_bindings_publish::Result<()> {
//! let primary = RegistryConfig::new("primary", "https://registry.example.com")
//!     .with_auth(RegistryAuth::basic("deployer", "secret"))
//!     .with_release_verification(false);
//! let public = RegistryConfig::new("crates-io", "https://crates.io")
//!     .with_auth(RegistryAuth::token("cio_token"));
//!
//! let publisher = Publisher::new(vec![primary, public], RetryPolicy::default())?;
//! for outcome in publisher.publish(&artifact).await? {
//!     println!("{}: {:?}", outcome.registry, outcome.release_attempts);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod publisher;
pub mod transition;
pub mod wire;

pub use client::{PublishWarnings, RegistryClient, VersionStatus};
pub use config::{RegistryAuth, RegistryConfig, RetryPolicy, DEFAULT_TIMEOUT};
pub use error::{PublishError, Result};
pub use publisher::{PublishOutcome, Publisher};
pub use transition::{await_release, ReleaseStatus};
pub use wire::{decode_publish_body, encode_publish_body, NewCrate, NewCrateDependency};
