//! Error types for schema compilation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for compiler operations.
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Errors that can occur while compiling proto sources.
#[derive(Error, Debug)]
pub enum CompilerError {
    /// Failed to read a proto file.
    #[error("Failed to read proto file {path}: {source}")]
    FileReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed proto syntax.
    #[error("Proto parse error in {file} at line {line}: {message}")]
    ParseError {
        /// File being parsed.
        file: String,
        /// Line number of the error.
        line: usize,
        /// Error message.
        message: String,
    },

    /// The source root holds no proto files.
    #[error("No .proto files found under {root}")]
    NoProtoFiles {
        /// Source root that was searched.
        root: PathBuf,
    },

    /// The `protoc` executable could not be run.
    #[error("Cannot run protoc at {path}: {source}")]
    MissingCompiler {
        /// Configured executable.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The installed `protoc` does not match the pinned version.
    #[error("protoc version mismatch: expected {expected}, found {found}")]
    CompilerVersionMismatch {
        /// Pinned version.
        expected: String,
        /// Reported version.
        found: String,
    },

    /// Code generation failed.
    #[error("Code generation failed: {message}")]
    CodegenError {
        /// Error message from the generator.
        message: String,
    },

    /// The generated output failed verification.
    #[error("Generated code verification failed: {message}")]
    VerificationError {
        /// Summary of the failures.
        message: String,
    },

    /// The API surface lost items relative to the baseline.
    #[error("Breaking changes against {baseline}: {count} item(s) removed")]
    IncompatibleApi {
        /// Baseline version.
        baseline: String,
        /// Number of removed items.
        count: usize,
    },

    /// Style check found errors.
    #[error("Proto lint failed with {count} error(s)")]
    LintFailed {
        /// Number of error-severity violations.
        count: usize,
    },

    /// I/O error during directory operations.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Core library error.
    #[error(transparent)]
    CoreError(#[from] otlp_bindings_core::Error),
}

impl CompilerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = CompilerError::ParseError {
            file: "trace.proto".to_string(),
            line: 12,
            message: "unterminated message block".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Proto parse error in trace.proto at line 12: unterminated message block"
        );
    }

    #[test]
    fn test_version_mismatch_display() {
        let err = CompilerError::CompilerVersionMismatch {
            expected: "23.4".to_string(),
            found: "25.1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "protoc version mismatch: expected 23.4, found 25.1"
        );
    }
}
