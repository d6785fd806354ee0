//! CLI commands and argument parsing.

pub mod args;
pub mod build;
pub mod fetch;
pub mod publish;
pub mod release;
pub mod resolve;
pub mod tasks;

use clap::{Parser, Subcommand};

/// otlp-bindings - Build and publish the OpenTelemetry Protocol Rust bindings
#[derive(Parser)]
#[command(name = "otlp-bindings")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the schema version for this build
    Resolve(resolve::ResolveArgs),

    /// Place the proto sources for the schema version on disk
    Fetch(fetch::FetchArgs),

    /// Show which pipeline tasks the task policy runs
    Tasks(tasks::TasksArgs),

    /// Compile the proto sources and package the bindings crate
    Build(build::BuildArgs),

    /// Publish a packaged crate to the configured registries
    Publish(publish::PublishArgs),

    /// Build and publish in one run
    Release(release::ReleaseArgs),

    /// Print version information
    Version,
}
