//! Error types for publish operations.

use thiserror::Error;

/// Result type alias for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Errors that can occur while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A target or retry policy is unusable.
    #[error("Invalid publish configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// A plain-http registry URL was configured without opting in.
    #[error("Refusing plain-http registry {url}; allow insecure transport explicitly to use it")]
    InsecureTransport {
        /// Registry URL.
        url: String,
    },

    /// Failed to reach the registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Request URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Credentials could not be encoded or were refused.
    #[error("Authentication failed for {registry}: {message}")]
    AuthenticationFailed {
        /// Registry name.
        registry: String,
        /// Error message.
        message: String,
    },

    /// The registry answered with an unexpected status.
    #[error("Registry {registry} returned HTTP {status}: {message}")]
    HttpError {
        /// Registry name.
        registry: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The registry accepted the request but rejected the crate.
    #[error("Registry {registry} rejected the upload: {message}")]
    Rejected {
        /// Registry name.
        registry: String,
        /// Registry error details.
        message: String,
    },

    /// The uploaded version did not become available in time.
    #[error(
        "{name} {version} was not released on {registry} after {attempts} attempt(s){}",
        detail(.last_error)
    )]
    ReleaseTimeout {
        /// Registry name.
        registry: String,
        /// Crate name.
        name: String,
        /// Crate version.
        version: String,
        /// Attempts made.
        attempts: u32,
        /// Last poll error, if the last attempt failed rather than reporting
        /// the version unavailable.
        last_error: Option<String>,
    },

    /// Artifact packaging error.
    #[error(transparent)]
    Artifact(#[from] otlp_bindings_core::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PublishError {
    /// Returns true if retrying the same request cannot succeed.
    ///
    /// Rejected credentials and 4xx responses are permanent, except 404
    /// (not visible yet) and 429 (rate limited).
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::AuthenticationFailed { .. } => true,
            Self::HttpError { status, .. } => {
                *status >= 400 && *status < 500 && *status != 404 && *status != 429
            }
            _ => false,
        }
    }
}

fn detail(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_timeout_display() {
        let err = PublishError::ReleaseTimeout {
            registry: "crates-io".to_string(),
            name: "opentelemetry-proto-bindings".to_string(),
            version: "1.0.0".to_string(),
            attempts: 300,
            last_error: None,
        };
        assert_eq!(
            err.to_string(),
            "opentelemetry-proto-bindings 1.0.0 was not released on crates-io after 300 attempt(s)"
        );

        let err = PublishError::ReleaseTimeout {
            registry: "crates-io".to_string(),
            name: "x".to_string(),
            version: "1.0.0".to_string(),
            attempts: 2,
            last_error: Some("HTTP 502".to_string()),
        };
        assert!(err.to_string().ends_with("after 2 attempt(s): HTTP 502"));
    }

    #[test]
    fn test_permanent_errors() {
        let http = |status| PublishError::HttpError {
            registry: "r".to_string(),
            status,
            message: String::new(),
        };
        assert!(http(400).is_permanent());
        assert!(http(401).is_permanent());
        assert!(http(403).is_permanent());
        assert!(!http(404).is_permanent());
        assert!(!http(429).is_permanent());
        assert!(!http(502).is_permanent());
        assert!(PublishError::AuthenticationFailed {
            registry: "r".to_string(),
            message: "bad token".to_string(),
        }
        .is_permanent());
    }
}
