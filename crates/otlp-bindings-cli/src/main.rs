//! otlp-bindings CLI - builds and publishes the OTLP Rust bindings.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod pipeline;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otlp_bindings=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(&args),
        Commands::Fetch(args) => commands::fetch::run(&args).await,
        Commands::Tasks(args) => commands::tasks::run(&args),
        Commands::Build(args) => commands::build::run(&args).await,
        Commands::Publish(args) => commands::publish::run(&args).await,
        Commands::Release(args) => commands::release::run(&args).await,
        Commands::Version => {
            println!("otlp-bindings {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
