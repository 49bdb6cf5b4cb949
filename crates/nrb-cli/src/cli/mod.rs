//! Command-line interface definition for nrb.
//!
//! # Command Structure
//!
//! - `nrb dev` - live-reloading development server in front of the bundler
//! - `nrb index` - rewrite the built entry document after a one-shot build

mod commands;
mod validation;

use clap::Parser;

pub use commands::{Command, DevArgs, IndexArgs};
pub use validation::parse_public_url;

/// nrb - front-end build tool
#[derive(Parser, Debug)]
#[command(
    name = "nrb",
    version,
    about = "Front-end build tool with a live-reloading dev server",
    long_about = "nrb drives esbuild for React/TypeScript projects.\n\
                  `nrb dev` serves the static directory, proxies everything else to the\n\
                  bundler's serve endpoint and reloads connected browsers on every change."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    ///
    /// Outputs plain text without ANSI color codes. Useful for logging to
    /// files or systems that don't support colored terminal output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
