//! Error handling for the nrb CLI.
//!
//! Errors are split the same way the dev subsystem fails:
//! - **Setup errors** (`CliError::Config`, `Server`, `Upstream`, `Tls`, `Watch` during start)
//!   abort startup and end the process with a non-zero status.
//! - Everything that happens per request or per connection is handled where it occurs and
//!   only logged; those paths never produce a `CliError`.
//!
//! # Example
//!
//! ```rust,no_run
//! use nrb_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_index(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Run the production build first")
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

mod report;

pub use report::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (invalid values, unreadable manifest, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Listener bind or HTTP server failures
    #[error("Server error: {0}")]
    Server(String),

    /// The upstream bundler could not be started or stopped
    #[error("Upstream bundler error: {0}")]
    Upstream(String),

    /// Certificate or key material could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Walking the source tree failed
    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Mutually exclusive or incomplete options were specified
    #[error("Conflicting options: {0}\n\nHint: These options cannot be used together")]
    ConflictingOptions(String),

    /// Missing required configuration field
    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField {
        /// Name of the missing field
        field: String,
        /// Helpful hint for providing the field
        hint: String,
    },

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a `NotFound` I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a hint to the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error message with `msg`.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
