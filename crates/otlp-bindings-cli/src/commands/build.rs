//! Build command implementation.

use anyhow::Result;
use clap::Args;
use otlp_bindings_core::TaskGate;
use tracing::info;

use super::args::{CodegenArgs, SourceArgs, TaskArgs, VersionArgs};
use crate::pipeline::{self, BuildOutcome, PipelineConfig};

/// Arguments for the build command.
#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub version: VersionArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub codegen: CodegenArgs,

    #[command(flatten)]
    pub tasks: TaskArgs,
}

impl BuildArgs {
    /// Builds the pipeline configuration. Resolves the schema version.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            version: self.version.resolve()?,
            sources: self.source.config(),
            baseline_sources: self.source.baseline_config(),
            compiler: self.codegen.config(&self.source.work_dir),
            out_dir: self.codegen.out_dir.clone(),
            gate: TaskGate::new(self.tasks.policy()),
            compat_baseline: self.tasks.baseline()?,
        })
    }
}

/// Runs the build command.
pub async fn run(args: &BuildArgs) -> Result<()> {
    let config = args.pipeline_config()?;
    info!(version = %config.version, out_dir = ?config.out_dir, "Building bindings crate");

    println!("OTLP Bindings Builder");
    println!("=====================");
    println!("Version:   {}", config.version);
    println!("Crate:     {}", config.compiler.crate_name);
    println!("Work dir:  {}", args.source.work_dir.display());
    println!("Output:    {}", config.out_dir.display());
    println!();

    let outcome = pipeline::run(&config).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Prints a summary of a pipeline run.
pub fn print_outcome(outcome: &BuildOutcome) {
    println!("✓ Bindings built successfully");
    println!("  Sources:  {}", outcome.sources.root.display());
    println!("  Crate:    {} {}", outcome.artifact.name, outcome.artifact.version);
    println!("  Files:    {}", outcome.artifact.file_count());
    println!("  Artifact: {}", outcome.crate_path.display());

    if let Some(lint) = &outcome.lint {
        println!("  Style:    {} finding(s), none fatal", lint.violations.len());
    }
    if let Some(report) = &outcome.verification {
        println!(
            "  Verified: {} package(s), {} service(s)",
            report.packages, report.services
        );
    }
    if let Some(compat) = &outcome.compat {
        println!(
            "  Compat:   compatible with {} ({} addition(s))",
            compat.baseline,
            compat.added.len()
        );
    }
    if let Some(path) = &outcome.sources_archive {
        println!("  Sources archive: {}", path.display());
    }
}
