//! Configuration types for the proto source provider.

use std::path::{Path, PathBuf};
use std::time::Duration;

use otlp_bindings_core::SchemaVersion;

use crate::error::SourceError;

/// Release archive URL, templated by `{version}`.
pub const DEFAULT_ARCHIVE_URL_TEMPLATE: &str =
    "https://github.com/open-telemetry/opentelemetry-proto/archive/v{version}.tar.gz";

/// Directory name prefix of extracted and copied sources.
const SOURCE_DIR_PREFIX: &str = "opentelemetry-proto";

/// Configuration for the proto source provider.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Working directory holding `archives/` and `protos/`.
    pub work_dir: PathBuf,

    /// Where the sources come from.
    pub source: ProtoSource,

    /// Request timeout for archive downloads.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

/// Where proto sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoSource {
    /// Download a release archive.
    Remote {
        /// Archive URL containing a `{version}` placeholder.
        url_template: String,
    },

    /// Copy an existing checkout.
    Local(LocalSource),
}

/// A local `opentelemetry-proto` checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    /// Checkout directory.
    pub path: PathBuf,

    /// Whether the checkout's version must match the resolved version.
    pub verify_version: bool,
}

impl LocalSource {
    /// Creates a local source with version verification enabled.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            verify_version: true,
        }
    }

    /// Disables the version check.
    #[must_use]
    pub const fn without_version_check(mut self) -> Self {
        self.verify_version = false;
        self
    }
}

impl SourceConfig {
    /// Creates a configuration that downloads release archives into `work_dir`.
    ///
    /// # Examples
    ///
    /// ```
    /// use otlp_bindings_source::{ProtoSource, SourceConfig};
    ///
    /// let config = SourceConfig::new("build");
    /// assert!(matches!(config.source, ProtoSource::Remote { .. }));
    /// ```
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            source: ProtoSource::Remote {
                url_template: DEFAULT_ARCHIVE_URL_TEMPLATE.to_string(),
            },
            timeout: Duration::from_secs(300),
            user_agent: format!("otlp-bindings/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Uses a local checkout instead of downloading.
    #[must_use]
    pub fn with_local(mut self, local: LocalSource) -> Self {
        self.source = ProtoSource::Local(local);
        self
    }

    /// Sets the archive URL template.
    #[must_use]
    pub fn with_archive_url_template(mut self, template: impl Into<String>) -> Self {
        self.source = ProtoSource::Remote {
            url_template: template.into(),
        };
        self
    }

    /// Sets the download timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the directory holding extracted or copied sources.
    #[must_use]
    pub fn protos_dir(&self) -> PathBuf {
        self.work_dir.join("protos")
    }

    /// Returns the directory holding cached archives.
    #[must_use]
    pub fn archives_dir(&self) -> PathBuf {
        self.work_dir.join("archives")
    }

    /// Returns the compiler input directory for a version.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use otlp_bindings_core::SchemaVersion;
    /// use otlp_bindings_source::SourceConfig;
    ///
    /// let config = SourceConfig::new("/build");
    /// assert_eq!(
    ///     config.proto_root(&SchemaVersion::new(1, 0, 0)),
    ///     PathBuf::from("/build/protos/opentelemetry-proto-1.0.0")
    /// );
    /// ```
    #[must_use]
    pub fn proto_root(&self, version: &SchemaVersion) -> PathBuf {
        self.protos_dir().join(source_dir_name(version))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive template lacks a `{version}`
    /// placeholder or the local path is empty.
    pub fn validate(&self) -> Result<(), SourceError> {
        match &self.source {
            ProtoSource::Remote { url_template } => {
                if !url_template.contains("{version}") {
                    return Err(SourceError::InvalidConfig {
                        message: format!("archive URL template has no {{version}}: {url_template}"),
                    });
                }
            }
            ProtoSource::Local(local) => {
                if local.path.as_os_str().is_empty() {
                    return Err(SourceError::InvalidConfig {
                        message: "local proto source path is empty".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Renders an archive URL template for a version.
///
/// # Errors
///
/// Returns an error if the rendered URL does not parse.
pub(crate) fn archive_url(template: &str, version: &SchemaVersion) -> Result<String, SourceError> {
    let rendered = template.replace("{version}", &version.to_string());
    url::Url::parse(&rendered).map_err(|e| SourceError::InvalidConfig {
        message: format!("invalid archive URL {rendered}: {e}"),
    })?;
    Ok(rendered)
}

/// Directory name of the sources for a version.
pub(crate) fn source_dir_name(version: &SchemaVersion) -> String {
    format!("{SOURCE_DIR_PREFIX}-{version}")
}

/// Extracts the version from a directory named `opentelemetry-proto-<version>`.
pub(crate) fn version_from_dir_name(path: &Path) -> Option<SchemaVersion> {
    let name = path.file_name()?.to_str()?;
    let version = name.strip_prefix(SOURCE_DIR_PREFIX)?.strip_prefix('-')?;
    SchemaVersion::parse(version).ok()
}
