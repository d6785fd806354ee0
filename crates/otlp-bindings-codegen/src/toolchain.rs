//! Pinned code generation toolchain.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{CompilerError, Result};

/// `protoc` release the bindings are generated with (protobuf 3.23.4).
pub const DEFAULT_PROTOC_VERSION: &str = "23.4";

/// The `protoc` executable and the version it must report.
///
/// The RPC stub generator is pinned by this crate's `tonic-build`
/// dependency, so only the schema compiler needs a runtime check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Path or name of the `protoc` executable.
    pub protoc: PathBuf,

    /// Version `protoc --version` must report, if checked.
    pub expected_version: Option<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            protoc: PathBuf::from("protoc"),
            expected_version: Some(DEFAULT_PROTOC_VERSION.to_string()),
        }
    }
}

impl Toolchain {
    /// Creates a toolchain using `protoc` from `PATH` and the default pin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `protoc` executable.
    #[must_use]
    pub fn with_protoc(mut self, protoc: impl Into<PathBuf>) -> Self {
        self.protoc = protoc.into();
        self
    }

    /// Sets the expected `protoc` version.
    #[must_use]
    pub fn with_expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = Some(version.into());
        self
    }

    /// Disables the version check.
    #[must_use]
    pub fn without_version_check(mut self) -> Self {
        self.expected_version = None;
        self
    }

    /// Returns the `protoc` executable.
    #[must_use]
    pub fn protoc(&self) -> &Path {
        &self.protoc
    }

    /// Runs `protoc --version` and returns the reported version.
    ///
    /// # Errors
    ///
    /// Returns an error if `protoc` cannot be run or prints something
    /// unexpected.
    pub fn installed_version(&self) -> Result<String> {
        let output = Command::new(&self.protoc)
            .arg("--version")
            .output()
            .map_err(|e| CompilerError::MissingCompiler {
                path: self.protoc.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(CompilerError::CodegenError {
                message: format!(
                    "protoc --version failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version_output(&stdout).ok_or_else(|| CompilerError::CodegenError {
            message: format!("unrecognized protoc version output: {}", stdout.trim()),
        })
    }

    /// Checks the installed `protoc` against the pin.
    ///
    /// Returns the installed version.
    ///
    /// # Errors
    ///
    /// Returns an error if `protoc` is missing or reports another version.
    pub fn verify(&self) -> Result<String> {
        let found = self.installed_version()?;
        debug!(protoc = ?self.protoc, version = %found, "Found protoc");

        if let Some(expected) = &self.expected_version {
            if !versions_match(expected, &found) {
                return Err(CompilerError::CompilerVersionMismatch {
                    expected: expected.clone(),
                    found,
                });
            }
        }

        info!(version = %found, "protoc toolchain verified");
        Ok(found)
    }
}

/// Extracts the version from `libprotoc 23.4`.
fn parse_version_output(output: &str) -> Option<String> {
    let version = output.trim().strip_prefix("libprotoc")?.trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Compares versions, ignoring the legacy `3.` major prefix (`3.23.4` is `23.4`).
fn versions_match(expected: &str, found: &str) -> bool {
    let strip = |v: &str| v.strip_prefix("3.").map_or_else(|| v.to_string(), String::from);
    expected == found || strip(expected) == strip(found)
}
