//! Error types for proto source operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while providing proto sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source configuration is unusable.
    #[error("Invalid source configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// The archive download could not be performed.
    #[error("Failed to download {url}: {source}")]
    DownloadFailed {
        /// Archive URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The archive server answered with a non-success status.
    #[error("Download of {url} failed with HTTP {status}")]
    HttpStatus {
        /// Archive URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The configured local checkout does not exist.
    #[error("Local proto source not found: {path}")]
    MissingLocalSource {
        /// Configured path.
        path: PathBuf,
    },

    /// The local checkout holds a different schema version.
    #[error("Local proto source {path} is version {found}, expected {expected}")]
    VersionMismatch {
        /// Local checkout path.
        path: PathBuf,
        /// Resolved schema version.
        expected: String,
        /// Version detected in the checkout.
        found: String,
    },

    /// The local checkout's version could not be determined.
    #[error(
        "Cannot determine the version of local proto source {path} (expected {expected}); \
         add a VERSION file or disable the check explicitly"
    )]
    UnverifiedLocalSource {
        /// Local checkout path.
        path: PathBuf,
        /// Resolved schema version.
        expected: String,
    },

    /// The local checkout lies at or below the directory it would be copied to.
    #[error("Local proto source {path} is inside the proto output directory {dest}")]
    OverlappingLocalSource {
        /// Local checkout path.
        path: PathBuf,
        /// Proto output directory.
        dest: PathBuf,
    },

    /// The archive could not be extracted or has an unexpected layout.
    #[error("Failed to extract {archive}: {message}")]
    Extract {
        /// Archive path.
        archive: PathBuf,
        /// Error message.
        message: String,
    },

    /// A background filesystem task panicked or was cancelled.
    #[error("Background filesystem task failed: {message}")]
    BlockingTask {
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("File I/O error at {path}: {source}")]
    IoError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_version_mismatch() {
        let err = SourceError::VersionMismatch {
            path: PathBuf::from("/src/opentelemetry-proto"),
            expected: "1.0.0".to_string(),
            found: "0.19.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Local proto source /src/opentelemetry-proto is version 0.19.0, expected 1.0.0"
        );
    }

    #[test]
    fn test_error_display_http_status() {
        let err = SourceError::HttpStatus {
            url: "https://example.com/v9.9.9.tar.gz".to_string(),
            status: 404,
        };
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_error_display_overlapping_local_source() {
        let err = SourceError::OverlappingLocalSource {
            path: PathBuf::from("/work/protos/opentelemetry-proto-1.0.0"),
            dest: PathBuf::from("/work/protos/opentelemetry-proto-1.0.0"),
        };
        assert!(err.to_string().contains("is inside the proto output directory"));
    }
}
