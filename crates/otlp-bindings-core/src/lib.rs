//! # OTLP Bindings Core
//!
//! Core types shared by every stage of the OTLP bindings build:
//!
//! - [`SchemaVersion`] - the `opentelemetry-proto` release being built, resolved
//!   from an explicit parameter or the nearest version-control tag
//! - [`TaskPolicy`] / [`TaskGate`] - which optional pipeline task categories run
//! - [`LibraryArtifact`] - the packaged bindings crate and its published metadata
//!
//! ## Example
//!
//! ```rust
//! use otlp_bindings_core::{resolve_version, SchemaVersion, TagLocator};
//!
//! struct NoTags;
//!
//! impl TagLocator for NoTags {
//!     fn nearest_tag(&self) -> otlp_bindings_core::Result<Option<String>> {
//!         Ok(None)
//!     }
//! }
//!
//! let version = resolve_version(Some("1.0.0"), &NoTags).unwrap();
//! assert_eq!(version, SchemaVersion::new(1, 0, 0));
//! assert_eq!(version.tag(), "v1.0.0");
//! ```

pub mod artifact;
pub mod error;
pub mod task;
pub mod version;


pub use artifact::{checksum_of, ArtifactBuilder, DependencySpec, LibraryArtifact, PackageMetadata};
pub use error::{Error, Result};
pub use task::{Task, TaskCategory, TaskDecision, TaskGate, TaskPolicy};
pub use version::{resolve_version, GitTagLocator, SchemaVersion, TagLocator};
