//! Schema compiler invocation.
//!
//! Runs `protoc` with the prost message generator and the tonic RPC stub
//! generator over every `.proto` file under a source root, writing one Rust
//! file per package into the generated crate's `src/` directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{CompilerError, Result};
use crate::parser::ProtoFile;
use crate::toolchain::Toolchain;

/// Configuration for a compilation.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Name of the generated crate.
    pub crate_name: String,

    /// Root directory of the generated crate.
    pub crate_dir: PathBuf,

    /// Pinned code generation toolchain.
    pub toolchain: Toolchain,
}

impl CompilerConfig {
    /// Creates a configuration with the default toolchain.
    #[must_use]
    pub fn new(crate_name: impl Into<String>, crate_dir: impl Into<PathBuf>) -> Self {
        Self {
            crate_name: crate_name.into(),
            crate_dir: crate_dir.into(),
            toolchain: Toolchain::default(),
        }
    }

    /// Sets the toolchain.
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Returns the directory generated sources are written to.
    #[must_use]
    pub fn src_dir(&self) -> PathBuf {
        self.crate_dir.join("src")
    }
}

/// Result of a compilation.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Source root the protos were compiled from.
    pub root: PathBuf,

    /// Parsed proto files, sorted by path.
    pub protos: Vec<ProtoFile>,

    /// Generated Rust files, sorted.
    pub generated: Vec<PathBuf>,
}

impl CompileOutput {
    /// Returns the distinct packages, sorted.
    #[must_use]
    pub fn packages(&self) -> Vec<&str> {
        let mut packages: Vec<_> = self
            .protos
            .iter()
            .filter_map(|p| p.package.as_deref())
            .collect();
        packages.sort_unstable();
        packages.dedup();
        packages
    }
}

/// Compiles proto sources into Rust.
#[derive(Debug)]
pub struct SchemaCompiler {
    config: CompilerConfig,
}

impl SchemaCompiler {
    /// Creates a compiler.
    #[must_use]
    pub const fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Finds every `.proto` file under `root`, skipping hidden directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be walked or holds no proto
    /// files.
    pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
        let mut protos = Vec::new();

        let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
            e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
        });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                CompilerError::io(
                    path,
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;

            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "proto")
            {
                protos.push(entry.into_path());
            }
        }

        if protos.is_empty() {
            return Err(CompilerError::NoProtoFiles {
                root: root.to_path_buf(),
            });
        }

        protos.sort();
        debug!(?root, count = protos.len(), "Discovered proto files");
        Ok(protos)
    }

    /// Parses the given proto files.
    ///
    /// # Errors
    ///
    /// Returns an error if any file is unreadable or malformed.
    pub fn parse_all(root: &Path, paths: &[PathBuf]) -> Result<Vec<ProtoFile>> {
        paths
            .iter()
            .map(|path| ProtoFile::parse_file(root, path))
            .collect()
    }

    /// Compiles every proto under `root` with client and server stubs.
    ///
    /// The toolchain is verified first. Sources are parsed before `protoc`
    /// runs so malformed files are reported with a file and line. Previous
    /// output in the crate's `src/` directory is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolchain check, discovery, parsing or code
    /// generation fails.
    pub fn compile(&self, root: &Path) -> Result<CompileOutput> {
        self.config.toolchain.verify()?;

        let paths = Self::discover(root)?;
        let protos = Self::parse_all(root, &paths)?;

        let src_dir = self.config.src_dir();
        if src_dir.exists() {
            std::fs::remove_dir_all(&src_dir).map_err(|e| CompilerError::io(&src_dir, e))?;
        }
        std::fs::create_dir_all(&src_dir).map_err(|e| CompilerError::io(&src_dir, e))?;

        info!(
            crate_name = %self.config.crate_name,
            files = paths.len(),
            "Compiling proto sources"
        );

        let mut prost_config = prost_build::Config::new();
        prost_config.protoc_executable(self.config.toolchain.protoc());

        tonic_build::configure()
            .build_client(true)
            .build_server(true)
            .emit_rerun_if_changed(false)
            .out_dir(&src_dir)
            .compile_protos_with_config(prost_config, &paths, &[root])
            .map_err(|e| CompilerError::CodegenError {
                message: e.to_string(),
            })?;

        let generated = generated_files(&src_dir)?;
        info!(generated = generated.len(), "Code generation complete");

        Ok(CompileOutput {
            root: root.to_path_buf(),
            protos,
            generated,
        })
    }
}

/// Lists the `.rs` files in a directory, sorted.
pub(crate) fn generated_files(src_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(src_dir).map_err(|e| CompilerError::io(src_dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CompilerError::io(src_dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
