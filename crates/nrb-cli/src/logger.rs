//! Logging setup for the nrb CLI.
//!
//! Structured logging goes through `tracing`. User-facing status lines (the listening
//! address, reload notices) go through [`crate::ui`] instead, so `--quiet` only silences
//! diagnostics.
//!
//! # Example
//!
//! ```rust,no_run
//! use nrb_cli::logger::init_logger;
//! use tracing::{debug, info};
//!
//! init_logger(false, false, false);
//!
//! info!("Watching src");
//! debug!(path = "src/app.tsx", "change recorded");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERBOSE_FILTER: &str = "nrb=debug,nrb_cli=debug";
const QUIET_FILTER: &str = "nrb=error,nrb_cli=error";
const DEFAULT_FILTER: &str = "nrb=info,nrb_cli=info";

/// Initialize the tracing subscriber.
///
/// Level selection, first match wins:
/// 1. `verbose`: DEBUG for nrb crates
/// 2. `quiet`: ERROR only
/// 3. `RUST_LOG`, if it parses
/// 4. INFO for nrb crates
///
/// Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(select_filter(verbose, quiet), no_color);
}

/// Initialize the subscriber with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn select_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_verbose_wins_over_quiet() {
        let filter = select_filter(true, true);
        assert!(filter.to_string().contains("nrb=debug"));
    }

    #[test]
    #[serial]
    fn test_rust_log_is_honoured() {
        std::env::set_var("RUST_LOG", "nrb=trace");
        let filter = select_filter(false, false);
        std::env::remove_var("RUST_LOG");
        assert!(filter.to_string().contains("nrb=trace"));
    }

    #[test]
    #[serial]
    fn test_default_filter_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        let filter = select_filter(false, false);
        assert!(filter.to_string().contains("nrb=info"));
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logger(false, true, true);
        init_logger(false, true, true);
    }
}
