//! Error types for OTLP bindings core operations.
//!
//! This module defines the error types used throughout the `otlp-bindings-core` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A version string is not a semantic version.
    #[error("Invalid schema version '{input}': {reason}")]
    InvalidVersion {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No schema version could be determined.
    #[error("Failed to resolve schema version: {reason}")]
    VersionResolution {
        /// Reason resolution failed.
        reason: String,
    },

    /// Running the version-control tool failed.
    #[error("Failed to run git in {dir}: {source}")]
    Git {
        /// Repository directory.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Unknown task category name.
    #[error("Unknown task category '{name}' (expected one of: {expected})")]
    UnknownTaskCategory {
        /// The rejected name.
        name: String,
        /// Comma-separated list of valid names.
        expected: String,
    },

    /// Artifact creation or packaging failed.
    #[error("Failed to package artifact: {reason}")]
    Artifact {
        /// Reason for the failure.
        reason: String,
    },

    /// File I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
