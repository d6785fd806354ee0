//! Proto source provider.

use std::path::{Path, PathBuf};

use otlp_bindings_core::SchemaVersion;
use serde::Serialize;

use crate::cache::ArchiveCache;
use crate::config::{archive_url, ProtoSource, SourceConfig};
use crate::error::SourceError;
use crate::local::{copy_tree, verify_version};
use crate::remote::{extract_archive, ArchiveDownloader};

/// Where provided sources came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum SourceOrigin {
    /// Copied from a local checkout.
    Local(PathBuf),
    /// Extracted from an archive already in the cache.
    CachedArchive(PathBuf),
    /// Extracted from a freshly downloaded archive.
    DownloadedArchive(PathBuf),
}

/// Proto sources ready for compilation.
#[derive(Debug, Clone, Serialize)]
pub struct ProvidedSources {
    /// Schema version of the sources.
    pub version: SchemaVersion,
    /// Compiler input directory.
    pub root: PathBuf,
    /// Where the sources came from.
    pub origin: SourceOrigin,
}

/// Places `opentelemetry-proto` sources on disk for a schema version.
#[derive(Debug)]
pub struct ProtoSourceProvider {
    config: SourceConfig,
    cache: ArchiveCache,
    downloader: ArchiveDownloader,
}

impl ProtoSourceProvider {
    /// Creates a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the archive
    /// directory cannot be created.
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        config.validate()?;
        let cache = ArchiveCache::new(config.archives_dir())?;
        let downloader = ArchiveDownloader::new(&config)?;
        Ok(Self {
            config,
            cache,
            downloader,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Returns the archive cache.
    #[must_use]
    pub const fn cache(&self) -> &ArchiveCache {
        &self.cache
    }

    /// Makes the sources for `version` available under
    /// [`SourceConfig::proto_root`].
    ///
    /// Any previous contents of that directory are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if a local checkout is missing or holds another
    /// version, or if the archive cannot be downloaded or extracted.
    pub async fn provide(&self, version: &SchemaVersion) -> Result<ProvidedSources, SourceError> {
        match &self.config.source {
            ProtoSource::Local(local) => {
                if !local.path.is_dir() {
                    return Err(SourceError::MissingLocalSource {
                        path: local.path.clone(),
                    });
                }

                if local.verify_version {
                    verify_version(&local.path, version)?;
                } else {
                    tracing::warn!(
                        path = ?local.path,
                        %version,
                        "Local proto source version check disabled"
                    );
                }

                let root = self.config.proto_root(version);
                let (source, work_dir) = self.check_local_layout(&local.path, &root).await?;
                remove_existing(&root).await?;
                let dest = root.clone();
                let protos =
                    run_blocking(move || copy_tree(&source, &dest, &work_dir)).await?;
                tracing::info!(
                    %version,
                    source = ?local.path,
                    protos,
                    "Copied local proto sources"
                );

                Ok(ProvidedSources {
                    version: version.clone(),
                    root,
                    origin: SourceOrigin::Local(local.path.clone()),
                })
            }
            ProtoSource::Remote { url_template } => {
                self.provide_remote(url_template, version).await
            }
        }
    }

    async fn provide_remote(
        &self,
        url_template: &str,
        version: &SchemaVersion,
    ) -> Result<ProvidedSources, SourceError> {
        let cache = self.cache.clone();
        let key = version.clone();
        let cached = run_blocking(move || cache.get(&key)).await?;

        let (archive, origin) = if let Some(cached) = cached {
            tracing::info!(%version, path = ?cached, "Using cached proto archive");
            (cached.clone(), SourceOrigin::CachedArchive(cached))
        } else {
            let url = archive_url(url_template, version)?;
            let bytes = self.downloader.download(&url).await?;
            let cache = self.cache.clone();
            let key = version.clone();
            let stored = run_blocking(move || cache.put(&key, &url, &bytes)).await?;
            (stored.clone(), SourceOrigin::DownloadedArchive(stored))
        };

        let root = self.config.proto_root(version);
        remove_existing(&root).await?;
        let (source, dest) = (archive.clone(), self.config.protos_dir());
        run_blocking(move || extract_archive(&source, &dest)).await?;

        if !root.is_dir() {
            return Err(SourceError::Extract {
                archive,
                message: format!(
                    "archive did not contain top-level directory {}",
                    root.file_name()
                        .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
                ),
            });
        }

        tracing::info!(%version, root = ?root, "Extracted proto sources");
        Ok(ProvidedSources {
            version: version.clone(),
            root,
            origin,
        })
    }
}

impl ProtoSourceProvider {
    /// Resolves the checkout and the working directory to canonical paths.
    ///
    /// A checkout at or below the proto output directory would be deleted
    /// before the copy, so that layout is rejected. A working directory
    /// inside the checkout is fine and is skipped while copying.
    async fn check_local_layout(
        &self,
        checkout: &Path,
        root: &Path,
    ) -> Result<(PathBuf, PathBuf), SourceError> {
        let work_dir = &self.config.work_dir;
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| SourceError::IoError {
                path: work_dir.clone(),
                source: e,
            })?;

        let source = canonicalize(checkout).await?;
        let work_dir = canonicalize(work_dir).await?;
        let relative_root =
            root.strip_prefix(&self.config.work_dir)
                .map_err(|e| SourceError::InvalidConfig {
                    message: format!("proto root {} is outside the work dir: {e}", root.display()),
                })?;
        let dest = work_dir.join(relative_root);

        if source.starts_with(&dest) {
            return Err(SourceError::OverlappingLocalSource { path: source, dest });
        }
        if work_dir.starts_with(&source) {
            tracing::debug!(work_dir = ?work_dir, "Work dir is inside the checkout, skipping it");
        }
        Ok((source, work_dir))
    }
}

async fn canonicalize(path: &Path) -> Result<PathBuf, SourceError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| SourceError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Runs filesystem-heavy work off the async runtime threads.
async fn run_blocking<T, F>(work: F) -> Result<T, SourceError>
where
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SourceError::BlockingTask {
            message: e.to_string(),
        })?
}

async fn remove_existing(dir: &Path) -> Result<(), SourceError> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(dir)
            .await
            .map_err(|e| SourceError::IoError {
                path: dir.to_path_buf(),
                source: e,
            })?;
    }
    Ok(())
}
