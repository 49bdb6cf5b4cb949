use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::validation::parse_public_url;

/// Available nrb subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Watches the source directory, runs the bundler in serve mode behind a
    /// reverse proxy and reloads connected browsers after every change.
    Dev(DevArgs),

    /// Rewrite the built entry document
    ///
    /// Injects the entry stylesheet and script into `<outputDir>/index.html`,
    /// replaces `%PUBLIC_URL%` and, with a metafile, adds modulepreload links
    /// for the configured chunk prefixes.
    Index(IndexArgs),
}

/// Arguments for the dev command
///
/// Every option left unset falls back to the `"nrb"` section of package.json,
/// then `NRB_*` environment variables, then the built-in defaults.
#[derive(Args, Debug, Default)]
pub struct DevArgs {
    /// Project directory (where package.json lives)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Port for the development server
    ///
    /// When the port is taken the server picks a free one, unless
    /// --strict-port is set.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Host name or address to bind
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Fail instead of falling back to a free port
    #[arg(long)]
    pub strict_port: bool,

    /// Base URL substituted for %PUBLIC_URL% in the entry document
    #[arg(long, value_name = "URL", value_parser = parse_public_url)]
    pub public_url: Option<String>,

    /// PEM certificate for HTTPS serving
    #[arg(long, value_name = "FILE", requires = "key")]
    pub cert: Option<PathBuf>,

    /// PEM private key for HTTPS serving
    #[arg(long, value_name = "FILE", requires = "cert")]
    pub key: Option<PathBuf>,
}

/// Arguments for the index command
#[derive(Args, Debug, Default)]
pub struct IndexArgs {
    /// Project directory (where package.json lives)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// esbuild metafile used to add chunk modulepreload links
    #[arg(long, value_name = "FILE")]
    pub metafile: Option<PathBuf>,

    /// Base URL substituted for %PUBLIC_URL%
    #[arg(long, value_name = "URL", value_parser = parse_public_url)]
    pub public_url: Option<String>,
}
