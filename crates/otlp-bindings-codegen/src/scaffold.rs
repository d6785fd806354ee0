//! Library crate scaffolding around generated code.
//!
//! The generator writes one file per package (`opentelemetry.proto.common.v1.rs`).
//! This module nests those files into a module tree in `lib.rs`, renders the
//! crate manifest, and packages the result as a [`LibraryArtifact`].

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use otlp_bindings_core::{DependencySpec, LibraryArtifact, PackageMetadata, SchemaVersion};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::compiler::CompileOutput;
use crate::error::{CompilerError, Result};

/// `prost` release matching the workspace's `prost-build`.
pub const PROST_VERSION: &str = "0.13";

/// `tonic` release matching the workspace's `tonic-build`.
pub const TONIC_VERSION: &str = "0.12";

/// File name of the crate README.
pub const README_FILE: &str = "README.md";

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "typeof", "unsized", "virtual", "yield", "try", "gen",
];

/// Nested module tree of generated packages.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleTree {
    children: BTreeMap<String, ModuleTree>,
    include: Option<String>,
}

impl ModuleTree {
    /// Builds the tree for a set of packages.
    ///
    /// A package may have its own generated file and child packages at the
    /// same time (`a.b` and `a.b.c`).
    #[must_use]
    pub fn from_packages<'a>(packages: impl IntoIterator<Item = &'a str>) -> Self {
        let mut root = Self::default();
        for package in packages {
            let mut node = &mut root;
            for segment in package.split('.').filter(|s| !s.is_empty()) {
                node = node.children.entry(segment.to_string()).or_default();
            }
            node.include = Some(format!("{package}.rs"));
        }
        root
    }

    /// Returns the child module for a segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&Self> {
        self.children.get(segment)
    }

    /// Returns the generated file included at this node.
    #[must_use]
    pub fn include(&self) -> Option<&str> {
        self.include.as_deref()
    }

    /// Renders the tree as Rust module declarations.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        if let Some(include) = &self.include {
            let _ = writeln!(out, "{indent}include!(\"{include}\");");
        }
        for (name, child) in &self.children {
            let _ = writeln!(out, "{indent}pub mod {} {{", module_ident(name));
            child.render_into(out, depth + 1);
            let _ = writeln!(out, "{indent}}}");
        }
    }
}

/// Returns the Rust module path of a proto package, escaping keyword
/// segments the way the module tree does (`a.type.v1` -> `a::r#type::v1`).
pub(crate) fn module_path(package: &str) -> String {
    package
        .split('.')
        .filter(|s| !s.is_empty())
        .map(module_ident)
        .collect::<Vec<_>>()
        .join("::")
}

fn module_ident(segment: &str) -> String {
    if RUST_KEYWORDS.contains(&segment) {
        format!("r#{segment}")
    } else {
        segment.to_string()
    }
}

/// Default dependencies of the generated crate.
#[must_use]
pub fn default_dependencies() -> Vec<DependencySpec> {
    vec![
        DependencySpec::new("prost", PROST_VERSION),
        DependencySpec::new("tonic", TONIC_VERSION),
    ]
}

/// Scaffolds and packages the generated library crate.
#[derive(Debug, Clone)]
pub struct CrateScaffold {
    name: String,
    version: SchemaVersion,
    metadata: PackageMetadata,
}

impl CrateScaffold {
    /// Creates a scaffold with default metadata for the OTLP bindings.
    #[must_use]
    pub fn new(name: impl Into<String>, version: SchemaVersion) -> Self {
        let metadata = PackageMetadata {
            description: Some(format!(
                "Rust bindings for the OpenTelemetry Protocol (OTLP) {version}"
            )),
            license: Some("Apache-2.0".to_string()),
            repository: Some("https://github.com/open-telemetry/opentelemetry-proto".to_string()),
            authors: vec!["OpenTelemetry Authors".to_string()],
            keywords: ["opentelemetry", "otlp", "protobuf", "grpc"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            categories: vec!["api-bindings".to_string()],
            readme_file: None,
            dependencies: default_dependencies(),
        };
        Self {
            name: name.into(),
            version,
            metadata,
        }
    }

    /// Replaces the package metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the crate name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the crate version.
    #[must_use]
    pub const fn version(&self) -> &SchemaVersion {
        &self.version
    }

    /// Renders `src/lib.rs` for a compilation.
    #[must_use]
    pub fn render_lib_rs(&self, output: &CompileOutput) -> String {
        let tree = ModuleTree::from_packages(output.packages());

        let mut lib = String::new();
        let _ = writeln!(
            lib,
            "//! Generated OTLP bindings for opentelemetry-proto {}.",
            self.version
        );
        lib.push_str("//!\n//! Do not edit: regenerate with `otlp-bindings build`.\n\n");
        lib.push_str("#![allow(clippy::all, clippy::pedantic, missing_docs)]\n\n");
        if output.protos.iter().any(|p| p.package.is_none()) {
            lib.push_str("include!(\"_.rs\");\n\n");
        }
        lib.push_str(&tree.render());
        lib
    }

    /// Renders `Cargo.toml`.
    #[must_use]
    pub fn render_cargo_toml(&self, with_readme: bool) -> String {
        let m = &self.metadata;
        let mut toml = String::from("[package]\n");
        let _ = writeln!(toml, "name = {}", toml_string(&self.name));
        let _ = writeln!(toml, "version = {}", toml_string(&self.version.to_string()));
        toml.push_str("edition = \"2021\"\n");
        if let Some(description) = &m.description {
            let _ = writeln!(toml, "description = {}", toml_string(description));
        }
        if let Some(license) = &m.license {
            let _ = writeln!(toml, "license = {}", toml_string(license));
        }
        if let Some(repository) = &m.repository {
            let _ = writeln!(toml, "repository = {}", toml_string(repository));
        }
        if !m.authors.is_empty() {
            let _ = writeln!(toml, "authors = {}", toml_array(&m.authors));
        }
        if !m.keywords.is_empty() {
            let _ = writeln!(toml, "keywords = {}", toml_array(&m.keywords));
        }
        if !m.categories.is_empty() {
            let _ = writeln!(toml, "categories = {}", toml_array(&m.categories));
        }
        if with_readme {
            let _ = writeln!(toml, "readme = {}", toml_string(README_FILE));
        }

        toml.push_str("\n[dependencies]\n");
        for dep in &m.dependencies {
            if dep.features.is_empty() && dep.default_features {
                let _ = writeln!(toml, "{} = {}", dep.name, toml_string(&dep.version_req));
            } else {
                let _ = write!(
                    toml,
                    "{} = {{ version = {}",
                    dep.name,
                    toml_string(&dep.version_req)
                );
                if !dep.default_features {
                    toml.push_str(", default-features = false");
                }
                if !dep.features.is_empty() {
                    let _ = write!(toml, ", features = {}", toml_array(&dep.features));
                }
                toml.push_str(" }\n");
            }
        }
        toml
    }

    /// Writes `src/lib.rs` next to the generated files.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_sources(&self, crate_dir: &Path, output: &CompileOutput) -> Result<()> {
        let lib_path = crate_dir.join("src").join("lib.rs");
        std::fs::write(&lib_path, self.render_lib_rs(output))
            .map_err(|e| CompilerError::io(&lib_path, e))?;
        debug!(path = ?lib_path, "Wrote module tree");
        Ok(())
    }

    /// Writes `Cargo.toml` and packages the crate directory.
    ///
    /// A `README.md` in the crate directory is included and declared as the
    /// crate README.
    ///
    /// # Errors
    ///
    /// Returns an error if files cannot be read or written, or the artifact
    /// is incomplete.
    pub fn package(&self, crate_dir: &Path) -> Result<LibraryArtifact> {
        let with_readme = crate_dir.join(README_FILE).is_file();
        let manifest_path = crate_dir.join("Cargo.toml");
        std::fs::write(&manifest_path, self.render_cargo_toml(with_readme))
            .map_err(|e| CompilerError::io(&manifest_path, e))?;

        let m = &self.metadata;
        let mut builder = LibraryArtifact::builder(&self.name).version(self.version.to_string());
        if let Some(description) = &m.description {
            builder = builder.description(description);
        }
        if let Some(license) = &m.license {
            builder = builder.license(license);
        }
        if let Some(repository) = &m.repository {
            builder = builder.repository(repository);
        }
        for author in &m.authors {
            builder = builder.author(author);
        }
        for keyword in &m.keywords {
            builder = builder.keyword(keyword);
        }
        for category in &m.categories {
            builder = builder.category(category);
        }
        for dependency in &m.dependencies {
            builder = builder.dependency(dependency.clone());
        }
        if with_readme {
            builder = builder.readme(README_FILE);
        }

        for entry in WalkDir::new(crate_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                CompilerError::io(
                    crate_dir,
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(crate_dir)
                .map_err(|e| CompilerError::CodegenError {
                    message: e.to_string(),
                })?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !is_packaged(&key) {
                continue;
            }
            let contents =
                std::fs::read(entry.path()).map_err(|e| CompilerError::io(entry.path(), e))?;
            builder = builder.add_file(key, contents);
        }

        let artifact = builder.build()?;
        info!(
            name = %artifact.name,
            version = %artifact.version,
            files = artifact.file_count(),
            "Packaged bindings crate"
        );
        Ok(artifact)
    }
}

/// Only the manifest, README and Rust sources are shipped.
fn is_packaged(path: &str) -> bool {
    path == "Cargo.toml"
        || path == README_FILE
        || (path.starts_with("src/") && path.ends_with(".rs"))
}

fn toml_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn toml_array(values: &[String]) -> String {
    let items: Vec<_> = values.iter().map(|v| toml_string(v)).collect();
    format!("[{}]", items.join(", "))
}
