//! Strategy Scout CLI: daily discovery, dedup and feasibility scoring of
//! open-source trading strategies.
//!
//! Runs the whole pipeline, or any single stage against a date-keyed
//! artifact, and inspects the persistent strategy store.

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
