//! Release command implementation.
//!
//! Builds the bindings crate and publishes it in one run. Publish targets
//! are validated before the build starts.

use anyhow::{Context, Result};
use clap::Args;
use otlp_bindings_publish::Publisher;

use super::args::RegistryArgs;
use super::build::{print_outcome, BuildArgs};
use crate::pipeline;

/// Arguments for the release command.
#[derive(Args)]
pub struct ReleaseArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    #[command(flatten)]
    pub registries: RegistryArgs,
}

/// Runs the release command.
pub async fn run(args: &ReleaseArgs) -> Result<()> {
    // Fail on bad credentials or URLs before spending time on the build.
    Publisher::new(args.registries.targets()?, args.registries.retry())
        .context("Invalid publish configuration")?;

    let config = args.build.pipeline_config()?;
    let outcome = pipeline::run(&config).await?;
    print_outcome(&outcome);
    println!();

    super::publish::publish(&outcome.artifact, &args.registries).await
}
