//! neurips-harvest CLI: concurrent NeurIPS proceedings harvester.
//!
//! Downloads paper PDFs for the selected years and records their metadata
//! as per-paper JSON files plus per-year JSON-lines and CSV logs.

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
