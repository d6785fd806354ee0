//! Publishing to a set of registries.

use otlp_bindings_core::LibraryArtifact;
use tracing::info;

use crate::client::{PublishWarnings, RegistryClient};
use crate::config::{RegistryConfig, RetryPolicy};
use crate::error::{PublishError, Result};
use crate::transition::await_release;

/// Outcome of publishing to one registry.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Registry name.
    pub registry: String,
    /// Warnings returned by the registry.
    pub warnings: PublishWarnings,
    /// Status polls until the release was available, if verified.
    pub release_attempts: Option<u32>,
}

/// Uploads an artifact to every configured registry in turn.
#[derive(Debug)]
pub struct Publisher {
    clients: Vec<RegistryClient>,
    retry: RetryPolicy,
}

impl Publisher {
    /// Creates a publisher.
    ///
    /// All targets are validated up front so a bad second target cannot
    /// fail the run after the first upload.
    ///
    /// # Errors
    ///
    /// Returns an error if no target is given, two targets share a name, a
    /// target is invalid, or the retry policy allows no attempts.
    pub fn new(targets: Vec<RegistryConfig>, retry: RetryPolicy) -> Result<Self> {
        if targets.is_empty() {
            return Err(PublishError::InvalidConfig {
                message: "no publish targets configured".to_string(),
            });
        }
        retry.validate()?;

        let mut names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(PublishError::InvalidConfig {
                message: format!("duplicate publish target {}", pair[0]),
            });
        }

        let clients = targets
            .into_iter()
            .map(RegistryClient::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clients, retry })
    }

    /// Returns the configured targets.
    pub fn targets(&self) -> impl Iterator<Item = &RegistryConfig> {
        self.clients.iter().map(RegistryClient::config)
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Publishes the artifact to each target sequentially, waiting for the
    /// release on targets that verify it. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first upload or release-transition error.
    pub async fn publish(&self, artifact: &LibraryArtifact) -> Result<Vec<PublishOutcome>> {
        let mut outcomes = Vec::with_capacity(self.clients.len());

        for client in &self.clients {
            let registry = client.config().name.clone();
            let warnings = client.publish(artifact).await?;

            let release_attempts = if client.config().verify_release {
                Some(await_release(client, &artifact.name, &artifact.version, &self.retry).await?)
            } else {
                info!(registry = %registry, "Skipping release verification");
                None
            };

            info!(
                registry = %registry,
                name = %artifact.name,
                version = %artifact.version,
                "Published"
            );
            outcomes.push(PublishOutcome {
                registry,
                warnings,
                release_attempts,
            });
        }

        Ok(outcomes)
    }
}
