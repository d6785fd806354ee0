//! # OTLP Bindings Codegen
//!
//! Compiles `opentelemetry-proto` sources into a Rust library crate.
//!
//! This crate provides functionality for:
//!
//! - Pinning and checking the `protoc` toolchain
//! - Discovering and parsing `.proto` files
//! - Generating messages and gRPC client/server stubs with `tonic-build`
//! - Scaffolding the library crate (module tree, manifest) and packaging it
//! - Optional checks and outputs: proto lint, generated code verification,
//!   API compatibility against a baseline, README, and a sources archive
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use otlp_bindings_codegen::{CompilerConfig, CrateScaffold, SchemaCompiler};
//! use otlp_bindings_core::SchemaVersion;
//!
//! let version = SchemaVersion::new(1, 0, 0);
//! let config = CompilerConfig::new("opentelemetry-proto-bindings", "build/crate");
//! let output = SchemaCompiler::new(config.clone())
//!     .compile(Path::new("build/protos/opentelemetry-proto-1.0.0"))?;
//!
//! let scaffold = CrateScaffold::new(&config.crate_name, version);
//! scaffold.write_sources(&config.crate_dir, &output)?;
//! let artifact = scaffold.package(&config.crate_dir)?;
//! println!("{}", artifact.file_name());
//! # Ok::<(), otlp_bindings_codegen::CompilerError>(())
//! ```

pub mod compat;
pub mod compiler;
pub mod docs;
pub mod error;
pub mod lint;
pub mod parser;
pub mod scaffold;
pub mod sources;
pub mod toolchain;
pub mod verify;

pub use compat::{ApiSurface, CompatReport};
pub use compiler::{CompileOutput, CompilerConfig, SchemaCompiler};
pub use docs::render_readme;
pub use error::{CompilerError, Result};
pub use lint::{LintReport, LintViolation, Linter, Severity};
pub use parser::{Declaration, ProtoFile, RpcDef, ServiceDef};
pub use scaffold::{default_dependencies, CrateScaffold, ModuleTree};
pub use sources::{sources_archive_name, write_sources_archive};
pub use toolchain::{Toolchain, DEFAULT_PROTOC_VERSION};
pub use verify::{verify_generated, VerificationReport};
