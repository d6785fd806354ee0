//! Publish command implementation.
//!
//! Uploads a packaged crate to every configured registry, waiting for the
//! release where the target requires it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use otlp_bindings_core::LibraryArtifact;
use otlp_bindings_publish::{PublishOutcome, Publisher};
use tracing::info;

use super::args::RegistryArgs;

/// Arguments for the publish command.
#[derive(Args)]
pub struct PublishArgs {
    /// Path to the packaged .crate file
    #[arg(required = true)]
    pub artifact: PathBuf,

    #[command(flatten)]
    pub registries: RegistryArgs,
}

/// Runs the publish command.
pub async fn run(args: &PublishArgs) -> Result<()> {
    if !args.artifact.exists() {
        anyhow::bail!("Artifact does not exist: {}", args.artifact.display());
    }

    let artifact =
        LibraryArtifact::from_file(&args.artifact).context("Failed to load crate artifact")?;
    publish(&artifact, &args.registries).await
}

/// Publishes an artifact to the targets configured by `registries`.
pub async fn publish(artifact: &LibraryArtifact, registries: &RegistryArgs) -> Result<()> {
    let publisher = Publisher::new(registries.targets()?, registries.retry())
        .context("Invalid publish configuration")?;

    println!("OTLP Bindings Publisher");
    println!("=======================");
    println!("Crate:   {} {}", artifact.name, artifact.version);
    for target in publisher.targets() {
        let wait = if target.verify_release {
            "waits for release"
        } else {
            "upload only"
        };
        println!("Target:  {} ({}, {wait})", target.name, target.url);
    }
    println!();

    info!(name = %artifact.name, version = %artifact.version, "Publishing crate");
    let outcomes = publisher
        .publish(artifact)
        .await
        .context("Failed to publish crate")?;

    for outcome in &outcomes {
        print_outcome(outcome);
    }
    println!();
    println!("Crate published successfully!");
    Ok(())
}

fn print_outcome(outcome: &PublishOutcome) {
    match outcome.release_attempts {
        Some(attempts) => println!(
            "✓ {}: released after {attempts} status check(s)",
            outcome.registry
        ),
        None => println!("✓ {}: uploaded", outcome.registry),
    }

    let warnings = &outcome.warnings;
    for category in &warnings.invalid_categories {
        println!("  warning: invalid category {category}");
    }
    for badge in &warnings.invalid_badges {
        println!("  warning: invalid badge {badge}");
    }
    for other in &warnings.other {
        println!("  warning: {other}");
    }
}
