//! Local cache of downloaded release archives.
//!
//! Entries are keyed by file name: an archive for a version that already
//! exists on disk is reused without touching the network. Downloads also
//! record a checksum sidecar; an entry whose bytes no longer match it is
//! dropped so the next run downloads it again.

use std::path::{Path, PathBuf};

use otlp_bindings_core::{checksum_of, SchemaVersion};

use crate::config::source_dir_name;
use crate::error::SourceError;

/// File-based archive cache.
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    dir: PathBuf,
}

impl ArchiveCache {
    /// Creates a cache rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| SourceError::IoError {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the archive for a version.
    #[must_use]
    pub fn archive_path(&self, version: &SchemaVersion) -> PathBuf {
        self.dir
            .join(format!("{}.tar.gz", source_dir_name(version)))
    }

    /// Returns the path of the checksum sidecar for a version.
    #[must_use]
    pub fn manifest_path(&self, version: &SchemaVersion) -> PathBuf {
        self.dir.join(format!("{}.json", source_dir_name(version)))
    }

    /// Looks up the archive for a version.
    ///
    /// Returns `None` if no archive exists or the archive no longer matches
    /// its recorded checksum. Archives placed without a sidecar are trusted.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive or its sidecar cannot be read.
    pub fn get(&self, version: &SchemaVersion) -> Result<Option<PathBuf>, SourceError> {
        let archive_path = self.archive_path(version);
        if !archive_path.exists() {
            return Ok(None);
        }

        let manifest_path = self.manifest_path(version);
        if manifest_path.exists() {
            if let Some(expected) = Self::read_stored_checksum(&manifest_path)? {
                let bytes = std::fs::read(&archive_path).map_err(|e| SourceError::IoError {
                    path: archive_path.clone(),
                    source: e,
                })?;
                let actual = checksum_of(&bytes);
                if actual != expected {
                    tracing::warn!(
                        %version,
                        expected,
                        actual,
                        "Archive checksum mismatch, invalidating"
                    );
                    self.invalidate(version)?;
                    return Ok(None);
                }
            }
        }

        tracing::debug!(%version, path = ?archive_path, "Archive cache hit");
        Ok(Some(archive_path))
    }

    /// Stores a downloaded archive and its checksum sidecar.
    ///
    /// The archive is written to a temporary file first and renamed into
    /// place, so an interrupted download never leaves a file that a later
    /// run would treat as a cache hit.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be written.
    pub fn put(
        &self,
        version: &SchemaVersion,
        url: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, SourceError> {
        let archive_path = self.archive_path(version);
        let partial_path = archive_path.with_extension("gz.part");

        std::fs::write(&partial_path, bytes).map_err(|e| SourceError::IoError {
            path: partial_path.clone(),
            source: e,
        })?;
        std::fs::rename(&partial_path, &archive_path).map_err(|e| SourceError::IoError {
            path: archive_path.clone(),
            source: e,
        })?;

        let manifest = serde_json::json!({
            "version": version.to_string(),
            "url": url,
            "checksum": checksum_of(bytes),
            "cached_at": chrono::Utc::now().to_rfc3339(),
        });
        let manifest_path = self.manifest_path(version);
        std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?).map_err(|e| {
            SourceError::IoError {
                path: manifest_path,
                source: e,
            }
        })?;

        tracing::debug!(%version, size = bytes.len(), "Cached archive");
        Ok(archive_path)
    }

    /// Removes the archive and sidecar for a version.
    ///
    /// # Errors
    ///
    /// Returns an error if files cannot be deleted.
    pub fn invalidate(&self, version: &SchemaVersion) -> Result<(), SourceError> {
        for path in [self.archive_path(version), self.manifest_path(version)] {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| SourceError::IoError {
                    path,
                    source: e,
                })?;
            }
        }
        Ok(())
    }

    /// Reads the stored checksum from a sidecar file.
    fn read_stored_checksum(path: &Path) -> Result<Option<String>, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|e| SourceError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let manifest: serde_json::Value = serde_json::from_str(&content)?;
        Ok(manifest
            .get("checksum")
            .and_then(|v| v.as_str())
            .map(String::from))
    }
}
