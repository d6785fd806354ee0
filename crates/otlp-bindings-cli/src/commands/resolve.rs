//! Resolve command implementation.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::args::{OutputFormat, VersionArgs};

/// Arguments for the resolve command.
#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub version: VersionArgs,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Runs the resolve command.
pub fn run(args: &ResolveArgs) -> Result<()> {
    let version = args.version.resolve()?;

    match args.format {
        OutputFormat::Text => println!("{version}"),
        OutputFormat::Json => {
            let value = json!({
                "version": version.to_string(),
                "tag": version.tag(),
                "explicit": args.version.release_version.is_some(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
