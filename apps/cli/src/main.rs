//! sitemapper CLI: resolve a sitemap tree into the list of pages it declares.
//!
//! Walks nested sitemap indexes from a root URL, extracts every page entry
//! of the leaf sitemaps and prints them, deduplicated, to stdout.

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
