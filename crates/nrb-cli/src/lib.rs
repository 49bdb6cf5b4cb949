//! nrb CLI - development-mode subsystem of the nrb front-end build tool.
//!
//! The dev server turns a static directory plus an `esbuild` serve endpoint into a
//! live-reloading development server: a filesystem watcher coalesces changes into
//! reloads, a broker pushes them to browsers over Server-Sent Events, and a reverse
//! proxy serves static files, forwards misses to the bundler and rewrites the HTML
//! entry document on the way out.
//!
//! # Architecture
//!
//! - [`error`] - Error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Terminal status output
//! - [`config`] - Layered configuration (defaults, package.json, env, CLI)
//! - [`dev`] - Watcher, broker, proxy, server and the session tying them together
//! - [`index_html`] - Entry document rewriting shared by `dev` and `index`
//! - `commands` - Individual CLI command implementations
//!
//! # Example
//!
//! ```rust
//! use nrb_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     // CLI command implementations...
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod index_html;
pub mod logger;
pub mod ui;

pub use error::{CliError, ConfigError, Result, ResultExt};
