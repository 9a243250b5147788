//! AssetPilot CLI — asset-sheet enrichment runner.
//!
//! Runs the batched enrichment pipeline (descriptions, comparables,
//! valuations) against a local sheet grid with live progress reporting.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
