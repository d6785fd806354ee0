//! Release archive download and extraction.

use std::fs::File;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::EntryType;

use crate::config::SourceConfig;
use crate::error::SourceError;

/// HTTP client for release archives.
#[derive(Debug)]
pub(crate) struct ArchiveDownloader {
    http: reqwest::Client,
}

impl ArchiveDownloader {
    /// Builds the HTTP client from the source configuration.
    pub(crate) fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| SourceError::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http })
    }

    /// Downloads an archive. Failures are not retried.
    pub(crate) async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        tracing::info!(url, "Downloading proto archive");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::DownloadFailed {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::DownloadFailed {
                url: url.to_string(),
                source: e,
            })?;

        Ok(bytes.to_vec())
    }
}

/// Extracts a gzip tarball into `dest`.
///
/// Entries that would escape `dest` are skipped by the tar unpacker, and
/// pax header records are ignored.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or an entry cannot be
/// written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize, SourceError> {
    let extract_err = |message: String| SourceError::Extract {
        archive: archive.to_path_buf(),
        message,
    };

    let file = File::open(archive).map_err(|e| SourceError::IoError {
        path: archive.to_path_buf(),
        source: e,
    })?;
    std::fs::create_dir_all(dest).map_err(|e| SourceError::IoError {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    let entries = tarball
        .entries()
        .map_err(|e| extract_err(format!("not a tar archive: {e}")))?;

    let mut unpacked = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| extract_err(format!("corrupt entry: {e}")))?;

        if matches!(
            entry.header().entry_type(),
            EntryType::XGlobalHeader | EntryType::XHeader
        ) {
            continue;
        }

        let written = entry
            .unpack_in(dest)
            .map_err(|e| extract_err(format!("failed to unpack entry: {e}")))?;
        if written {
            unpacked += 1;
        }
    }

    tracing::debug!(?archive, ?dest, entries = unpacked, "Extracted archive");
    Ok(unpacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extract_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("protos.tar.gz");
        write_archive(
            &archive,
            &[
                (
                    "opentelemetry-proto-1.0.0/opentelemetry/proto/common/v1/common.proto",
                    "syntax = \"proto3\";",
                ),
                ("opentelemetry-proto-1.0.0/README.md", "# protos"),
            ],
        );

        let dest = dir.path().join("protos");
        let count = extract_archive(&archive, &dest).unwrap();

        assert_eq!(count, 2);
        assert!(dest
            .join("opentelemetry-proto-1.0.0/opentelemetry/proto/common/v1/common.proto")
            .exists());
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        std::fs::write(&archive, b"<html>rate limited</html>").unwrap();

        let err = extract_archive(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, SourceError::Extract { .. }));
    }
}
