//! Schema version resolution.
//!
//! The `opentelemetry-proto` release to build is resolved exactly once per
//! invocation:
//! - an explicit release parameter always wins
//! - otherwise the nearest version tag reachable from `HEAD` is used
//!
//! Tag lookup sits behind [`TagLocator`] so callers pass the repository state
//! in explicitly instead of reading it ambiently.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A semantic version of the `opentelemetry-proto` schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Pre-release suffix without the leading `-` (e.g. `alpha.1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<String>,
}

impl SchemaVersion {
    /// Creates a release version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// Sets the pre-release suffix.
    #[must_use]
    pub fn with_pre(mut self, pre: impl Into<String>) -> Self {
        self.pre = Some(pre.into());
        self
    }

    /// Parses a version, accepting an optional leading `v`.
    ///
    /// # Examples
    ///
    /// ```
    /// use otlp_bindings_core::SchemaVersion;
    ///
    /// let version = SchemaVersion::parse("v1.3.2").unwrap();
    /// assert_eq!(version, SchemaVersion::new(1, 3, 2));
    ///
    /// let pre = SchemaVersion::parse("1.0.0-rc.1").unwrap();
    /// assert_eq!(pre.pre.as_deref(), Some("rc.1"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not `major.minor.patch[-pre]`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let version = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let (core, pre) = match version.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => {
                return Err(invalid(input, "empty pre-release suffix"));
            }
            None => (version, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid(
                input,
                "expected three dot-separated components",
            ));
        }

        let component = |idx: usize, name: &str| -> Result<u64> {
            parts[idx]
                .parse::<u64>()
                .map_err(|_| invalid(input, &format!("{name} component is not a number")))
        };

        Ok(Self {
            major: component(0, "major")?,
            minor: component(1, "minor")?,
            patch: component(2, "patch")?,
            pre,
        })
    }

    /// Returns the version-control tag for this version (`v<version>`).
    #[must_use]
    pub fn tag(&self) -> String {
        format!("v{self}")
    }
}

fn invalid(input: &str, reason: &str) -> Error {
    Error::InvalidVersion {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for SchemaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Source of the nearest version-control tag.
pub trait TagLocator {
    /// Returns the nearest version tag reachable from the current commit, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be inspected.
    fn nearest_tag(&self) -> Result<Option<String>>;
}

/// Locates the nearest tag with `git describe`.
#[derive(Debug, Clone)]
pub struct GitTagLocator {
    repo_dir: PathBuf,
}

impl GitTagLocator {
    /// Creates a locator for the repository at `repo_dir`.
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    /// Returns the repository directory.
    #[must_use]
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

impl TagLocator for GitTagLocator {
    fn nearest_tag(&self) -> Result<Option<String>> {
        let output = Command::new("git")
            .args(["describe", "--tags", "--abbrev=0", "--match", "v[0-9]*"])
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|e| Error::Git {
                dir: self.repo_dir.clone(),
                source: e,
            })?;

        if output.status.success() {
            let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!(tag, "Located nearest tag");
            return Ok((!tag.is_empty()).then_some(tag));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No names found") || stderr.contains("No tags can describe") {
            return Ok(None);
        }

        Err(Error::VersionResolution {
            reason: format!("git describe failed: {}", stderr.trim()),
        })
    }
}

/// Resolves the schema version for this build.
///
/// An explicit version always wins regardless of tag history. Without one,
/// the nearest tag reported by `locator` is used.
///
/// # Errors
///
/// Returns an error if no version can be determined or the chosen version
/// does not parse.
pub fn resolve_version(explicit: Option<&str>, locator: &dyn TagLocator) -> Result<SchemaVersion> {
    if let Some(explicit) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        let version = SchemaVersion::parse(explicit)?;
        info!(%version, "Using explicit schema version");
        return Ok(version);
    }

    let tag = locator.nearest_tag()?.ok_or_else(|| Error::VersionResolution {
        reason: "no release version given and no version tag is reachable".to_string(),
    })?;

    let version = SchemaVersion::parse(&tag)?;
    info!(%version, tag, "Using schema version from nearest tag");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTag(Option<&'static str>);

    impl TagLocator for FixedTag {
        fn nearest_tag(&self) -> Result<Option<String>> {
            Ok(self.0.map(String::from))
        }
    }

    struct BrokenRepo;

    impl TagLocator for BrokenRepo {
        fn nearest_tag(&self) -> Result<Option<String>> {
            Err(Error::VersionResolution {
                reason: "not a repository".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        assert_eq!(
            SchemaVersion::parse("v0.19.0").unwrap(),
            SchemaVersion::new(0, 19, 0)
        );
        assert_eq!(
            SchemaVersion::parse("1.0.0").unwrap(),
            SchemaVersion::new(1, 0, 0)
        );
    }

    #[test]
    fn test_parse_rejects_partial_versions() {
        assert!(SchemaVersion::parse("v1.2").is_err());
        assert!(SchemaVersion::parse("latest").is_err());
        assert!(SchemaVersion::parse("1.0.0-").is_err());
    }

    #[test]
    fn test_display_and_tag() {
        let version = SchemaVersion::new(1, 3, 2).with_pre("alpha");
        assert_eq!(version.to_string(), "1.3.2-alpha");
        assert_eq!(version.tag(), "v1.3.2-alpha");
    }

    #[test]
    fn test_explicit_override_ignores_tags() {
        let version = resolve_version(Some("0.20.0"), &FixedTag(Some("v1.1.0"))).unwrap();
        assert_eq!(version, SchemaVersion::new(0, 20, 0));
    }

    #[test]
    fn test_explicit_override_never_touches_repository() {
        let version = resolve_version(Some("v1.0.0"), &BrokenRepo).unwrap();
        assert_eq!(version, SchemaVersion::new(1, 0, 0));
    }

    #[test]
    fn test_falls_back_to_nearest_tag() {
        let version = resolve_version(None, &FixedTag(Some("v1.1.0"))).unwrap();
        assert_eq!(version, SchemaVersion::new(1, 1, 0));
    }

    #[test]
    fn test_blank_override_falls_back_to_tag() {
        let version = resolve_version(Some("  "), &FixedTag(Some("v0.9.0"))).unwrap();
        assert_eq!(version, SchemaVersion::new(0, 9, 0));
    }

    #[test]
    fn test_no_override_and_no_tag_fails() {
        let err = resolve_version(None, &FixedTag(None)).unwrap_err();
        assert!(matches!(err, Error::VersionResolution { .. }));
    }

    #[test]
    fn test_unparsable_tag_fails() {
        let err = resolve_version(None, &FixedTag(Some("release-candidate"))).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }
}
