//! Cargo registry web API client.

use otlp_bindings_core::LibraryArtifact;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{RegistryAuth, RegistryConfig};
use crate::error::{PublishError, Result};
use crate::wire::{encode_publish_body, NewCrate};

/// Availability of a version on a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// The version is published and downloadable.
    Available,
    /// The version exists but was yanked.
    Yanked,
    /// The registry does not (yet) know the version.
    Missing,
}

/// Warnings returned by a successful upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublishWarnings {
    /// Categories the registry did not recognize.
    #[serde(default)]
    pub invalid_categories: Vec<String>,
    /// Badges the registry did not recognize.
    #[serde(default)]
    pub invalid_badges: Vec<String>,
    /// Other warnings.
    #[serde(default)]
    pub other: Vec<String>,
}

impl PublishWarnings {
    /// Returns true if there are no warnings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invalid_categories.is_empty() && self.invalid_badges.is_empty() && self.other.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    warnings: PublishWarnings,
}

#[derive(Debug, Deserialize)]
struct ApiErrors {
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: VersionInfo,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(default)]
    yanked: bool,
}

/// Client for one Cargo registry.
#[derive(Debug)]
pub struct RegistryClient {
    config: RegistryConfig,
    http: reqwest::Client,
}

impl RegistryClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use otlp_bindings_publish::{RegistryClient, RegistryConfig};
    ///
    /// let client = RegistryClient::new(RegistryConfig::new("crates-io", "https://crates.io"))?;
    /// # Ok::<(), otlp_bindings_publish::PublishError>(())
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| PublishError::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, http })
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Uploads an artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached, refuses the
    /// credentials, or rejects the crate.
    pub async fn publish(&self, artifact: &LibraryArtifact) -> Result<PublishWarnings> {
        let url = self.config.api_url("crates/new");
        let metadata = NewCrate::from_artifact(artifact);
        let body = encode_publish_body(&metadata, &artifact.to_crate_bytes()?)?;

        info!(
            registry = %self.config.name,
            name = %artifact.name,
            version = %artifact.version,
            bytes = body.len(),
            "Uploading crate"
        );

        let response = self
            .http
            .put(&url)
            .headers(self.auth_headers()?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::ConnectionFailed {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PublishError::AuthenticationFailed {
                registry: self.config.name.clone(),
                message: api_error_detail(&text).unwrap_or_else(|| status.to_string()),
            });
        }

        // crates.io reports rejections as 200 with an `errors` array.
        if let Some(detail) = api_error_detail(&text) {
            return Err(PublishError::Rejected {
                registry: self.config.name.clone(),
                message: detail,
            });
        }

        if !status.is_success() {
            return Err(PublishError::HttpError {
                registry: self.config.name.clone(),
                status: status.as_u16(),
                message: text,
            });
        }

        let warnings = serde_json::from_str::<PublishResponse>(&text)
            .map(|r| r.warnings)
            .unwrap_or_default();
        if !warnings.is_empty() {
            warn!(registry = %self.config.name, ?warnings, "Registry returned warnings");
        }
        Ok(warnings)
    }

    /// Queries the availability of a version.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached or answers with an
    /// unexpected status.
    pub async fn version_status(&self, name: &str, version: &str) -> Result<VersionStatus> {
        let url = self.config.api_url(&format!("crates/{name}/{version}"));

        let response = self
            .http
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| PublishError::ConnectionFailed {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(registry = %self.config.name, name, version, "Version not found yet");
            return Ok(VersionStatus::Missing);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::AuthenticationFailed {
                registry: self.config.name.clone(),
                message: api_error_detail(&text).unwrap_or_else(|| status.to_string()),
            });
        }
        if !status.is_success() {
            return Err(PublishError::HttpError {
                registry: self.config.name.clone(),
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let text = response.text().await.unwrap_or_default();
        let body: VersionResponse = serde_json::from_str(&text)?;
        Ok(if body.version.yanked {
            VersionStatus::Yanked
        } else {
            VersionStatus::Available
        })
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let value = match &self.config.auth {
            RegistryAuth::None => return Ok(headers),
            RegistryAuth::Basic { username, password } => {
                let credentials = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{username}:{password}"),
                );
                format!("Basic {credentials}")
            }
            RegistryAuth::Token { token } => token.clone(),
        };

        let mut value =
            HeaderValue::from_str(&value).map_err(|_| PublishError::AuthenticationFailed {
                registry: self.config.name.clone(),
                message: "credentials contain invalid header characters".to_string(),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

fn api_error_detail(body: &str) -> Option<String> {
    let errors: ApiErrors = serde_json::from_str(body).ok()?;
    if errors.errors.is_empty() {
        return None;
    }
    Some(
        errors
            .errors
            .into_iter()
            .map(|e| e.detail)
            .collect::<Vec<_>>()
            .join("; "),
    )
}
