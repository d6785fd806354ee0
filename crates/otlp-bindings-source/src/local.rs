//! Local checkout support: version detection and copying.

use std::path::Path;

use otlp_bindings_core::SchemaVersion;
use walkdir::WalkDir;

use crate::config::version_from_dir_name;
use crate::error::SourceError;

/// Detects the schema version of a local `opentelemetry-proto` checkout.
///
/// Checked in order:
/// 1. a `VERSION` file holding the version
/// 2. the first `## <version>` heading of `CHANGELOG.md`
/// 3. a directory name of the form `opentelemetry-proto-<version>`
///
/// # Errors
///
/// Returns an error if a marker file exists but cannot be read.
pub fn detect_version(dir: &Path) -> Result<Option<SchemaVersion>, SourceError> {
    let version_file = dir.join("VERSION");
    if version_file.is_file() {
        let content = read(&version_file)?;
        if let Ok(version) = SchemaVersion::parse(content.trim()) {
            return Ok(Some(version));
        }
    }

    let changelog = dir.join("CHANGELOG.md");
    if changelog.is_file() {
        let content = read(&changelog)?;
        if let Some(version) = first_changelog_version(&content) {
            return Ok(Some(version));
        }
    }

    Ok(version_from_dir_name(dir))
}

fn read(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|e| SourceError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Returns the first released version heading, skipping `## Unreleased`.
fn first_changelog_version(content: &str) -> Option<SchemaVersion> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("## "))
        .filter_map(|heading| heading.split_whitespace().next())
        .find_map(|token| SchemaVersion::parse(token).ok())
}

/// Checks a local checkout against the resolved version.
pub(crate) fn verify_version(dir: &Path, expected: &SchemaVersion) -> Result<(), SourceError> {
    match detect_version(dir)? {
        Some(found) if &found == expected => Ok(()),
        Some(found) => Err(SourceError::VersionMismatch {
            path: dir.to_path_buf(),
            expected: expected.to_string(),
            found: found.to_string(),
        }),
        None => Err(SourceError::UnverifiedLocalSource {
            path: dir.to_path_buf(),
            expected: expected.to_string(),
        }),
    }
}

/// Copies a checkout into `dest`, skipping `.git` and the `exclude`
/// directory. Returns the number of `.proto` files copied.
pub(crate) fn copy_tree(src: &Path, dest: &Path, exclude: &Path) -> Result<usize, SourceError> {
    let mut protos = 0;

    let walker = WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git" && e.path() != exclude && e.path() != dest);

    for entry in walker {
        let entry = entry.map_err(|e| SourceError::IoError {
            path: e.path().map_or_else(|| src.to_path_buf(), Path::to_path_buf),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SourceError::InvalidConfig {
                message: e.to_string(),
            })?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| SourceError::IoError {
                path: target.clone(),
                source: e,
            })?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| SourceError::IoError {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            if target.extension().is_some_and(|ext| ext == "proto") {
                protos += 1;
            }
        }
    }

    Ok(protos)
}
