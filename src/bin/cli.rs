// src/bin/cli.rs
use clap::Parser;
use market_watch::cli::{self, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    cli::run(Cli::parse()).await
}
