//! nrb CLI entry point.
//!
//! Handles command-line argument parsing, logging initialization, and command
//! dispatch.

use clap::Parser;
use miette::Result;
use nrb_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Dev(dev_args) => commands::dev_execute(dev_args).await,
        cli::Command::Index(index_args) => commands::index_execute(index_args).await,
    };

    // Convert CLI errors to miette diagnostics for error reporting
    result.map_err(error::cli_error_to_miette)
}
