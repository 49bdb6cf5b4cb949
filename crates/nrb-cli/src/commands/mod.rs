//! Command implementations for the nrb CLI.
//!
//! - [`dev`] - Live-reloading development server
//! - [`index`] - Entry document rewriting after a one-shot build
//!
//! Each command provides an `execute` function that takes the parsed command
//! arguments and returns a Result.

pub mod dev;
pub mod index;

pub use dev::execute as dev_execute;
pub use index::execute as index_execute;
