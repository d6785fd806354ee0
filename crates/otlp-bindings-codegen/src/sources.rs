//! Source archive of the compiled proto files.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use otlp_bindings_core::SchemaVersion;
use tracing::info;

use crate::error::{CompilerError, Result};
use crate::parser::ProtoFile;

/// Returns the archive file name: `<name>-<version>-sources.tar.gz`.
#[must_use]
pub fn sources_archive_name(name: &str, version: &SchemaVersion) -> String {
    format!("{name}-{version}-sources.tar.gz")
}

/// Packs the given proto files into `out_dir`.
///
/// Entries are stored under `<name>-<version>-sources/` in path order with
/// zeroed timestamps, so the same sources always produce the same bytes.
///
/// # Errors
///
/// Returns an error if a source cannot be read or the archive cannot be
/// written.
pub fn write_sources_archive(
    root: &Path,
    protos: &[ProtoFile],
    out_dir: &Path,
    name: &str,
    version: &SchemaVersion,
) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir).map_err(|e| CompilerError::io(out_dir, e))?;
    let archive_path = out_dir.join(sources_archive_name(name, version));
    let prefix = format!("{name}-{version}-sources");

    let mut paths: Vec<&str> = protos.iter().map(|p| p.path.as_str()).collect();
    paths.sort_unstable();
    paths.dedup();

    let file = File::create(&archive_path).map_err(|e| CompilerError::io(&archive_path, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for relative in &paths {
        let source = root.join(relative);
        let contents = std::fs::read(&source).map_err(|e| CompilerError::io(&source, e))?;

        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{prefix}/{relative}"), contents.as_slice())
            .map_err(|e| CompilerError::io(&archive_path, e))?;
    }

    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| CompilerError::io(&archive_path, e))?;

    info!(path = ?archive_path, files = paths.len(), "Wrote sources archive");
    Ok(archive_path)
}
