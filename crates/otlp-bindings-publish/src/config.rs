//! Configuration types for publish targets.

use std::time::Duration;

use crate::error::{PublishError, Result};

/// Default connect and request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A registry the crate is published to.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Name used in logs and errors (e.g. "primary", "crates-io").
    pub name: String,

    /// Base URL of the registry web API (e.g. "<https://crates.io>").
    pub url: String,

    /// Authentication configuration.
    pub auth: RegistryAuth,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Overall request timeout.
    pub timeout: Duration,

    /// Whether to poll until the uploaded version is available.
    pub verify_release: bool,

    /// Whether a plain-http URL is accepted.
    pub allow_insecure: bool,

    /// User agent string.
    pub user_agent: String,
}

impl RegistryConfig {
    /// Creates a registry configuration with the given name and API URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use otlp_bindings_publish::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("crates-io", "https://crates.io/");
    /// assert_eq!(config.url, "https://crates.io");
    /// assert!(config.verify_release);
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            name: name.into(),
            url: url.trim_end_matches('/').to_string(),
            auth: RegistryAuth::None,
            connect_timeout: DEFAULT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            verify_release: true,
            allow_insecure: false,
            user_agent: format!("otlp-bindings-publish/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether the release transition is awaited after upload.
    #[must_use]
    pub const fn with_release_verification(mut self, verify: bool) -> Self {
        self.verify_release = verify;
        self
    }

    /// Accepts a plain-http URL.
    #[must_use]
    pub const fn allow_insecure(mut self) -> Self {
        self.allow_insecure = true;
        self
    }

    /// Returns the URL of an API path.
    ///
    /// # Examples
    ///
    /// ```
    /// use otlp_bindings_publish::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("crates-io", "https://crates.io");
    /// assert_eq!(
    ///     config.api_url("crates/new"),
    ///     "https://crates.io/api/v1/crates/new"
    /// );
    /// ```
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.url, path.trim_start_matches('/'))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse, uses a scheme other than
    /// https (or http when allowed), or the timeouts are zero.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url).map_err(|e| PublishError::InvalidConfig {
            message: format!("registry {} has an invalid URL {}: {e}", self.name, self.url),
        })?;

        match parsed.scheme() {
            "https" => {}
            "http" if self.allow_insecure => {
                tracing::warn!(registry = %self.name, url = %self.url, "Using plain-http registry");
            }
            "http" => {
                return Err(PublishError::InsecureTransport {
                    url: self.url.clone(),
                })
            }
            other => {
                return Err(PublishError::InvalidConfig {
                    message: format!("registry {} uses unsupported scheme {other}", self.name),
                })
            }
        }

        if self.connect_timeout.is_zero() || self.timeout.is_zero() {
            return Err(PublishError::InvalidConfig {
                message: format!("registry {} has a zero timeout", self.name),
            });
        }

        Ok(())
    }
}

/// Authentication methods for registry access.
#[derive(Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    /// No authentication.
    None,

    /// Basic authentication.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    /// Registry API token, sent verbatim in the `Authorization` header.
    Token {
        /// Token value.
        token: String,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates token authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use otlp_bindings_publish::RegistryAuth;
    ///
    /// let auth = RegistryAuth::token("cio_abc");
    /// assert!(!format!("{auth:?}").contains("cio_abc"));
    /// ```
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token { .. } => f
                .debug_struct("Token")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Retry policy for the release-transition check.
///
/// Attempts are spaced by a fixed delay with no backoff or jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of status polls.
    pub max_attempts: u32,

    /// Delay between polls.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 300,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the longest time spent sleeping between attempts, saturating
    /// at [`Duration::MAX`].
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.delay
            .checked_mul(self.max_attempts.saturating_sub(1))
            .unwrap_or(Duration::MAX)
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if no attempts are allowed.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PublishError::InvalidConfig {
                message: "retry policy must allow at least one attempt".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::new("primary", "https://registry.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(300));
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.auth, RegistryAuth::None);
        assert!(config.validate().is_ok());

        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 300);
        assert_eq!(policy.delay, Duration::from_secs(10));
        assert_eq!(policy.max_wait(), Duration::from_secs(2990));
    }

    #[test]
    fn test_max_wait_saturates() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.max_wait(), Duration::MAX);
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_wait(), Duration::ZERO);
    }

    #[test]
    fn test_plain_http_requires_opt_in() {
        let config = RegistryConfig::new("local", "http://127.0.0.1:8080");
        assert!(matches!(
            config.validate(),
            Err(PublishError::InsecureTransport { .. })
        ));
        assert!(config.allow_insecure().validate().is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let config = RegistryConfig::new("broken", "not a url");
        assert!(matches!(
            config.validate(),
            Err(PublishError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(RetryPolicy::default().with_max_attempts(0).validate().is_err());
    }

    #[test]
    fn test_basic_auth_debug_redacts_password() {
        let auth = RegistryAuth::basic("deployer", "hunter2");
        let debug = format!("{auth:?}");
        assert!(debug.contains("deployer"));
        assert!(!debug.contains("hunter2"));
    }
}
