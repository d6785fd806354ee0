//! Library artifact model.
//!
//! This module defines the [`LibraryArtifact`] structure: the packaged
//! bindings crate together with the metadata a registry needs to publish it.
//! On disk an artifact is a `.crate` gzip tarball plus a JSON sidecar.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

/// A packaged crate ready for upload.
///
/// # Examples
///
/// ```rust
/// use otlp_bindings_core::LibraryArtifact;
///
/// let artifact = LibraryArtifact::builder("opentelemetry-proto-bindings")
///     .version("1.0.0")
///     .add_file("Cargo.toml", "[package]\nname = \"opentelemetry-proto-bindings\"\n")
///     .add_file("src/lib.rs", "")
///     .build()
///     .unwrap();
///
/// assert_eq!(artifact.file_name(), "opentelemetry-proto-bindings-1.0.0.crate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryArtifact {
    /// Crate name.
    pub name: String,

    /// Crate version.
    pub version: String,

    /// When the artifact was assembled.
    pub created_at: DateTime<Utc>,

    /// Files relative to the crate root (path -> contents).
    pub files: BTreeMap<String, Vec<u8>>,

    /// Metadata sent to the registry alongside the tarball.
    pub metadata: PackageMetadata,
}

/// Published metadata of a crate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// SPDX license expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Source repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Authors.
    #[serde(default)]
    pub authors: Vec<String>,

    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Registry categories.
    #[serde(default)]
    pub categories: Vec<String>,

    /// Path of the README inside the crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_file: Option<String>,

    /// Normal dependencies of the crate.
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

/// A dependency declared by the published crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Dependency crate name.
    pub name: String,
    /// Version requirement (e.g. `0.13`).
    pub version_req: String,
    /// Enabled features.
    #[serde(default)]
    pub features: Vec<String>,
    /// Whether default features are enabled.
    #[serde(default = "default_true")]
    pub default_features: bool,
}

const fn default_true() -> bool {
    true
}

impl DependencySpec {
    /// Creates a dependency with default features.
    #[must_use]
    pub fn new(name: impl Into<String>, version_req: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_req: version_req.into(),
            features: Vec::new(),
            default_features: true,
        }
    }

    /// Adds an enabled feature.
    #[must_use]
    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    /// Disables default features.
    #[must_use]
    pub const fn without_default_features(mut self) -> Self {
        self.default_features = false;
        self
    }
}

/// JSON sidecar stored next to a `.crate` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactManifest {
    name: String,
    version: String,
    created_at: DateTime<Utc>,
    checksum: String,
    metadata: PackageMetadata,
}

impl LibraryArtifact {
    /// Creates a new builder for constructing a [`LibraryArtifact`].
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ArtifactBuilder {
        ArtifactBuilder::new(name)
    }

    /// Returns the `.crate` file name: `<name>-<version>.crate`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}-{}.crate", self.name, self.version)
    }

    /// Returns the sidecar file name: `<name>-<version>.metadata.json`.
    #[must_use]
    pub fn manifest_file_name(&self) -> String {
        format!("{}-{}.metadata.json", self.name, self.version)
    }

    /// Returns the directory prefix of every tarball entry.
    fn archive_prefix(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Returns the number of files in the crate.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Returns the contents of a file, if present.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Serializes the crate as a gzip tarball with entries under
    /// `<name>-<version>/`.
    ///
    /// Output is deterministic: entries are sorted and timestamps are zeroed.
    ///
    /// # Errors
    ///
    /// Returns an error if the tarball cannot be written.
    pub fn to_crate_bytes(&self) -> Result<Vec<u8>> {
        let prefix = self.archive_prefix();
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (path, contents) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{prefix}/{path}"), contents.as_slice())
                .map_err(|e| Error::Artifact {
                    reason: format!("failed to append {path}: {e}"),
                })?;
        }

        let encoder = builder.into_inner().map_err(|e| Error::Artifact {
            reason: format!("failed to finish tarball: {e}"),
        })?;
        encoder.finish().map_err(|e| Error::Artifact {
            reason: format!("failed to finish gzip stream: {e}"),
        })
    }

    /// Computes the SHA-256 checksum (hex) of the `.crate` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the tarball cannot be produced.
    pub fn compute_checksum(&self) -> Result<String> {
        let bytes = self.to_crate_bytes()?;
        Ok(checksum_of(&bytes))
    }

    /// Writes the `.crate` file and its metadata sidecar into `dir`.
    ///
    /// Returns the path of the `.crate` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be written.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let bytes = self.to_crate_bytes()?;
        let crate_path = dir.join(self.file_name());
        std::fs::write(&crate_path, &bytes).map_err(|e| Error::Io {
            path: crate_path.clone(),
            source: e,
        })?;

        let manifest = ArtifactManifest {
            name: self.name.clone(),
            version: self.version.clone(),
            created_at: self.created_at,
            checksum: checksum_of(&bytes),
            metadata: self.metadata.clone(),
        };
        let manifest_path = dir.join(self.manifest_file_name());
        std::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).map_err(|e| {
            Error::Io {
                path: manifest_path,
                source: e,
            }
        })?;

        debug!(path = ?crate_path, "Wrote crate artifact");
        Ok(crate_path)
    }

    /// Loads an artifact from a `.crate` file and its metadata sidecar.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is missing, the tarball is malformed,
    /// or the tarball does not match the checksum recorded in the sidecar.
    pub fn from_file(crate_path: impl AsRef<Path>) -> Result<Self> {
        let crate_path = crate_path.as_ref();
        let manifest_path = sidecar_path(crate_path)?;

        let manifest_bytes = std::fs::read(&manifest_path).map_err(|e| Error::Io {
            path: manifest_path.clone(),
            source: e,
        })?;
        let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes)?;

        let bytes = std::fs::read(crate_path).map_err(|e| Error::Io {
            path: crate_path.to_path_buf(),
            source: e,
        })?;

        let actual = checksum_of(&bytes);
        if actual != manifest.checksum {
            return Err(Error::Artifact {
                reason: format!(
                    "checksum mismatch for {}: expected {}, got {actual}",
                    crate_path.display(),
                    manifest.checksum
                ),
            });
        }

        let prefix = format!("{}-{}/", manifest.name, manifest.version);
        let files = read_tarball(&bytes, &prefix)?;

        Ok(Self {
            name: manifest.name,
            version: manifest.version,
            created_at: manifest.created_at,
            files,
            metadata: manifest.metadata,
        })
    }
}

/// Computes the hex SHA-256 of raw bytes.
#[must_use]
pub fn checksum_of(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn sidecar_path(crate_path: &Path) -> Result<PathBuf> {
    let stem = crate_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".crate"))
        .ok_or_else(|| Error::Artifact {
            reason: format!("{} is not a .crate file", crate_path.display()),
        })?;
    Ok(crate_path.with_file_name(format!("{stem}.metadata.json")))
}

fn read_tarball(bytes: &[u8], prefix: &str) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut files = BTreeMap::new();

    let entries = archive.entries().map_err(|e| Error::Artifact {
        reason: format!("failed to read tarball: {e}"),
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::Artifact {
            reason: format!("failed to read tarball entry: {e}"),
        })?;
        let path = entry
            .path()
            .map_err(|e| Error::Artifact {
                reason: format!("invalid entry path: {e}"),
            })?
            .to_string_lossy()
            .into_owned();

        let relative = path.strip_prefix(prefix).ok_or_else(|| Error::Artifact {
            reason: format!("entry {path} is outside {prefix}"),
        })?;

        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(|e| Error::Artifact {
            reason: format!("failed to read {path}: {e}"),
        })?;
        files.insert(relative.to_string(), contents);
    }

    Ok(files)
}

/// Builder for constructing [`LibraryArtifact`] instances.
#[derive(Debug)]
pub struct ArtifactBuilder {
    name: String,
    version: Option<String>,
    files: BTreeMap<String, Vec<u8>>,
    metadata: PackageMetadata,
}

impl ArtifactBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            files: BTreeMap::new(),
            metadata: PackageMetadata::default(),
        }
    }

    /// Sets the crate version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a file relative to the crate root.
    #[must_use]
    pub fn add_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    /// Sets the license expression.
    #[must_use]
    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.metadata.license = Some(license.into());
        self
    }

    /// Sets the repository URL.
    #[must_use]
    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.metadata.repository = Some(repository.into());
        self
    }

    /// Adds an author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.metadata.authors.push(author.into());
        self
    }

    /// Adds a keyword.
    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.metadata.keywords.push(keyword.into());
        self
    }

    /// Adds a registry category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.metadata.categories.push(category.into());
        self
    }

    /// Sets the README path inside the crate.
    #[must_use]
    pub fn readme(mut self, path: impl Into<String>) -> Self {
        self.metadata.readme_file = Some(path.into());
        self
    }

    /// Adds a normal dependency.
    #[must_use]
    pub fn dependency(mut self, dependency: DependencySpec) -> Self {
        self.metadata.dependencies.push(dependency);
        self
    }

    /// Builds the artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is missing, the crate has no
    /// `Cargo.toml`, or the declared README is not part of the crate.
    pub fn build(self) -> Result<LibraryArtifact> {
        let version = self.version.ok_or_else(|| Error::Artifact {
            reason: "version is required".to_string(),
        })?;

        if !self.files.contains_key("Cargo.toml") {
            return Err(Error::Artifact {
                reason: format!("{} has no Cargo.toml", self.name),
            });
        }

        if let Some(ref readme) = self.metadata.readme_file {
            if !self.files.contains_key(readme) {
                return Err(Error::Artifact {
                    reason: format!("README {readme} is not part of the crate"),
                });
            }
        }

        Ok(LibraryArtifact {
            name: self.name,
            version,
            created_at: Utc::now(),
            files: self.files,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LibraryArtifact {
        LibraryArtifact::builder("otlp-test")
            .version("1.0.0")
            .add_file("Cargo.toml", "[package]\nname = \"otlp-test\"\n")
            .add_file("src/lib.rs", "pub mod opentelemetry {}\n")
            .add_file("README.md", "# otlp-test\n")
            .readme("README.md")
            .description("test bindings")
            .license("Apache-2.0")
            .dependency(DependencySpec::new("prost", "0.13"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_version() {
        let result = LibraryArtifact::builder("otlp-test")
            .add_file("Cargo.toml", "")
            .build();
        assert!(matches!(result, Err(Error::Artifact { .. })));
    }

    #[test]
    fn test_builder_requires_manifest() {
        let result = LibraryArtifact::builder("otlp-test")
            .version("1.0.0")
            .add_file("src/lib.rs", "")
            .build();
        assert!(result.unwrap_err().to_string().contains("no Cargo.toml"));
    }

    #[test]
    fn test_builder_rejects_missing_readme() {
        let result = LibraryArtifact::builder("otlp-test")
            .version("1.0.0")
            .add_file("Cargo.toml", "")
            .readme("README.md")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_tarball_entries_are_prefixed() {
        let artifact = sample();
        let bytes = artifact.to_crate_bytes().unwrap();
        let files = read_tarball(&bytes, "otlp-test-1.0.0/").unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files["src/lib.rs"], b"pub mod opentelemetry {}\n");
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let first = sample();
        let second = sample();
        assert_eq!(
            first.compute_checksum().unwrap(),
            second.compute_checksum().unwrap()
        );
    }

    #[test]
    fn test_write_and_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = sample();
        let path = artifact.write_to_dir(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "otlp-test-1.0.0.crate");
        assert!(dir.path().join("otlp-test-1.0.0.metadata.json").exists());

        let loaded = LibraryArtifact::from_file(&path).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_load_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample().write_to_dir(dir.path()).unwrap();
        std::fs::write(&path, b"not a tarball").unwrap();

        let err = LibraryArtifact::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_sidecar_path_requires_crate_extension() {
        assert!(sidecar_path(Path::new("/tmp/otlp.tar.gz")).is_err());
        assert_eq!(
            sidecar_path(Path::new("/dist/otlp-1.0.0.crate")).unwrap(),
            PathBuf::from("/dist/otlp-1.0.0.metadata.json")
        );
    }
}
