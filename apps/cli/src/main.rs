//! Gatherbox CLI: incremental ingest of the Gatherer card catalog.
//!
//! Loads a checkpoint, fetches every card it does not know yet, backfills
//! incomplete printings and writes the checkpoint back.

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
