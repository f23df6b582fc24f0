//! roamweb CLI: publish an org-roam knowledge base as a static website.
//!
//! Reads the org-roam database, filters out private notes, and writes a site
//! with per-note pages, backlinks, tag pages and link graphs.

mod commands;
mod serve;

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
