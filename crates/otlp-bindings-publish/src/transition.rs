//! Release-transition polling.
//!
//! After an upload, a registry may take a while before the version can be
//! downloaded. [`await_release`] polls a [`ReleaseStatus`] source at a fixed
//! delay until the version is available, up to a hard attempt cap.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::client::{RegistryClient, VersionStatus};
use crate::config::RetryPolicy;
use crate::error::{PublishError, Result};

/// Source of release status for an uploaded version.
#[async_trait]
pub trait ReleaseStatus: Send + Sync {
    /// Name of the registry, for logs and errors.
    fn registry(&self) -> &str;

    /// Returns true once the version is available.
    async fn is_released(&self, name: &str, version: &str) -> Result<bool>;
}

#[async_trait]
impl ReleaseStatus for RegistryClient {
    fn registry(&self) -> &str {
        &self.config().name
    }

    async fn is_released(&self, name: &str, version: &str) -> Result<bool> {
        Ok(self.version_status(name, version).await? == VersionStatus::Available)
    }
}

/// Polls until the version is released.
///
/// Stops at the first successful poll and returns the number of attempts
/// made. A poll that errors transiently counts as a failed attempt. There is
/// no backoff and no jitter.
///
/// # Errors
///
/// Returns [`PublishError::ReleaseTimeout`] after exactly
/// `policy.max_attempts` failed attempts, or an error if the policy allows
/// no attempts. A permanent error (see [`PublishError::is_permanent`]) is
/// returned as is from the attempt that hit it.
pub async fn await_release(
    status: &dyn ReleaseStatus,
    name: &str,
    version: &str,
    policy: &RetryPolicy,
) -> Result<u32> {
    policy.validate()?;
    let registry = status.registry();
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match status.is_released(name, version).await {
            Ok(true) => {
                info!(registry, name, version, attempt, "Release is available");
                return Ok(attempt);
            }
            Ok(false) => {
                last_error = None;
                info!(
                    registry,
                    name,
                    version,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "Release not yet available"
                );
            }
            Err(e) if e.is_permanent() => {
                warn!(registry, name, version, attempt, error = %e, "Release status check rejected");
                return Err(e);
            }
            Err(e) => {
                warn!(registry, name, version, attempt, error = %e, "Release status check failed");
                last_error = Some(e.to_string());
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(PublishError::ReleaseTimeout {
        registry: registry.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        attempts: policy.max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Reports the version released on the `released_on`-th call.
    struct Scripted {
        calls: AtomicU32,
        released_on: Option<u32>,
        fail_with: Option<u16>,
    }

    impl Scripted {
        fn released_on(n: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                released_on: Some(n),
                fail_with: None,
            }
        }

        fn never() -> Self {
            Self {
                calls: AtomicU32::new(0),
                released_on: None,
                fail_with: None,
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                calls: AtomicU32::new(0),
                released_on: None,
                fail_with: Some(status),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReleaseStatus for Scripted {
        fn registry(&self) -> &str {
            "test"
        }

        async fn is_released(&self, _name: &str, _version: &str) -> Result<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(status) = self.fail_with {
                return Err(PublishError::HttpError {
                    registry: "test".to_string(),
                    status,
                    message: "scripted failure".to_string(),
                });
            }
            Ok(self.released_on.is_some_and(|n| call >= n))
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let status = Scripted::released_on(3);
        let attempts = await_release(&status, "x", "1.0.0", &policy(10)).await.unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(status.calls(), 3);
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let status = Scripted::released_on(1);
        let slow = RetryPolicy::new(5, Duration::from_secs(3600));
        let attempts = await_release(&status, "x", "1.0.0", &slow).await.unwrap();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_fails_after_exactly_max_attempts() {
        let status = Scripted::never();
        let err = await_release(&status, "x", "1.0.0", &policy(4)).await.unwrap_err();

        assert_eq!(status.calls(), 4);
        assert!(matches!(
            err,
            PublishError::ReleaseTimeout {
                attempts: 4,
                last_error: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_errors_count_as_attempts() {
        let status = Scripted::failing(502);
        let err = await_release(&status, "x", "1.0.0", &policy(2)).await.unwrap_err();

        assert_eq!(status.calls(), 2);
        match err {
            PublishError::ReleaseTimeout { last_error, .. } => {
                assert!(last_error.unwrap().contains("502"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let status = Scripted::released_on(1);
        assert!(matches!(
            await_release(&status, "x", "1.0.0", &policy(0)).await,
            Err(PublishError::InvalidConfig { .. })
        ));
        assert_eq!(status.calls(), 0);
    }

    #[tokio::test]
    async fn test_client_errors_fail_fast() {
        for code in [400, 401, 403] {
            let status = Scripted::failing(code);
            let err = await_release(&status, "x", "1.0.0", &policy(5)).await.unwrap_err();

            assert_eq!(status.calls(), 1, "HTTP {code} should not be retried");
            assert!(matches!(err, PublishError::HttpError { status, .. } if status == code));
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let status = Scripted::failing(429);
        let err = await_release(&status, "x", "1.0.0", &policy(3)).await.unwrap_err();

        assert_eq!(status.calls(), 3);
        assert!(matches!(err, PublishError::ReleaseTimeout { .. }));
    }
}
