//! CLI entry point for the libgen tool.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app;
mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = app::terminal::resolve_default_log_level(args.quiet, args.verbose);
    app::terminal::init_tracing(default_level);

    debug!(?args, "CLI arguments parsed");

    app::runtime::run_libgen(args).await
}
