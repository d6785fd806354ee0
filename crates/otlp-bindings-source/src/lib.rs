//! # OTLP Bindings Source
//!
//! Makes the `opentelemetry-proto` sources for a resolved schema version
//! available on local disk before compilation.
//!
//! Two mutually exclusive sources are supported:
//!
//! - **Local checkout**: copied into the working proto directory after its
//!   version is checked against the resolved one
//! - **Release archive**: downloaded from a URL templated by version, cached by
//!   file name so re-runs skip the download, then extracted
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use otlp_bindings_core::SchemaVersion;
//! use otlp_bindings_source::{ProtoSourceProvider, SourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = ProtoSourceProvider::new(SourceConfig::new("build"))?;
//!     let sources = provider.provide(&SchemaVersion::new(1, 0, 0)).await?;
//!     println!("protos at {}", sources.root.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! ```text
//! <work_dir>/
//! ├── archives/opentelemetry-proto-<version>.tar.gz   (cached download)
//! ├── archives/opentelemetry-proto-<version>.json     (checksum sidecar)
//! └── protos/opentelemetry-proto-<version>/           (compiler input)
//! ```

mod cache;
mod config;
mod error;
mod local;
mod provider;
mod remote;

pub use cache::ArchiveCache;
pub use config::{LocalSource, ProtoSource, SourceConfig, DEFAULT_ARCHIVE_URL_TEMPLATE};
pub use error::SourceError;
pub use local::detect_version;
pub use provider::{ProtoSourceProvider, ProvidedSources, SourceOrigin};
pub use remote::extract_archive;
