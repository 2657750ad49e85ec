//! campaign-migrator CLI: move campaigns and content blocks between
//! engagement platforms.
//!
//! Reads campaigns from the source dashboard (or local JSON exports),
//! re-hosts their assets, and creates equivalent drafts on the target.

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
