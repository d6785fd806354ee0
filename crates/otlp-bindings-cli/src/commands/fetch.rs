//! Fetch command implementation.
//!
//! Places the proto sources for the resolved version under the working
//! directory without compiling them.

use anyhow::{Context, Result};
use clap::Args;
use otlp_bindings_source::{ProtoSourceProvider, SourceOrigin};
use tracing::info;

use super::args::{OutputFormat, SourceArgs, VersionArgs};

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub version: VersionArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Runs the fetch command.
pub async fn run(args: &FetchArgs) -> Result<()> {
    let version = args.version.resolve()?;
    info!(%version, work_dir = ?args.source.work_dir, "Fetching proto sources");

    let provider =
        ProtoSourceProvider::new(args.source.config()).context("Invalid proto source")?;
    let sources = provider
        .provide(&version)
        .await
        .context("Failed to provide proto sources")?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sources)?),
        OutputFormat::Text => {
            let origin = match &sources.origin {
                SourceOrigin::Local(path) => format!("local checkout {}", path.display()),
                SourceOrigin::CachedArchive(path) => format!("cached archive {}", path.display()),
                SourceOrigin::DownloadedArchive(path) => {
                    format!("downloaded archive {}", path.display())
                }
            };
            println!("✓ opentelemetry-proto {version}");
            println!("  Sources: {}", sources.root.display());
            println!("  From:    {origin}");
        }
    }
    Ok(())
}
