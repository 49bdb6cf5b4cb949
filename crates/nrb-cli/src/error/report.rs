//! Miette diagnostic conversion for CLI errors.
//!
//! `main` hands the final error to miette so setup failures are rendered the same way
//! regardless of which component raised them.

use crate::error::{CliError, ConfigError};
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => config_error_to_miette(e),
        CliError::Upstream(msg) => miette::miette!(
            help = "Check that the bundler executable is installed and on PATH",
            "Upstream bundler error: {}",
            msg
        ),
        CliError::Tls(msg) => miette::miette!(
            help = "Certificate and key must be PEM files",
            "TLS error: {}",
            msg
        ),
        _ => miette::miette!("{}", err),
    }
}

/// Convert ConfigError to miette Report
pub fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::InvalidValue { field, value, hint } => {
            miette::miette!(help = hint, "Invalid value for '{}': {}", field, value)
        }
        ConfigError::MissingField { field, hint } => {
            miette::miette!(help = hint, "Missing required field: {}", field)
        }
        _ => miette::miette!("Configuration error: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_keeps_field_in_message() {
        let report = config_error_to_miette(ConfigError::InvalidValue {
            field: "debounceMs".to_string(),
            value: "0".to_string(),
            hint: "Use a positive number of milliseconds".to_string(),
        });
        assert!(report.to_string().contains("debounceMs"));
    }

    #[test]
    fn test_generic_error_passes_message_through() {
        let report = cli_error_to_miette(CliError::Server("bind failed".to_string()));
        assert!(report.to_string().contains("bind failed"));
    }
}
