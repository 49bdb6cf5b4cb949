//! Dev command implementation.
//!
//! Loads the project configuration, starts the dev session and keeps it running
//! until Ctrl+C or a fatal error.

use crate::cli::DevArgs;
use crate::config::{base_dir_from, CliOverrides, DevConfig};
use crate::dev::DevSession;
use crate::error::Result;
use crate::ui;
use tokio::signal;

/// Execute the dev command.
///
/// # Process Flow
///
/// 1. Load and validate configuration for the project directory
/// 2. Start the bundler, watcher and HTTP server
/// 3. Broadcast reloads until Ctrl+C
///
/// # Errors
///
/// Returns setup errors (configuration, bundler start, watcher, bind, TLS) and
/// fatal runtime errors from the session.
pub async fn execute(args: DevArgs) -> Result<()> {
    let base_dir = base_dir_from(args.cwd.as_ref())?;
    let config = DevConfig::load(&base_dir, &CliOverrides::from(&args))?;
    config.validate()?;

    ui::info("Starting development server...");
    let session = DevSession::start(&config).await?;

    print_banner(&config, &session);

    let result = session
        .run_until(async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::warn!(error = %err, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    match &result {
        Ok(()) => ui::success("Development server stopped"),
        Err(_) => ui::error("Development server stopped"),
    }
    result
}

fn print_banner(config: &DevConfig, session: &DevSession) {
    ui::success("Dev server ready");
    ui::item("Local", session.url());
    ui::item("Watching", &config.source_root().display().to_string());
    for file in config.extra_watch_files().iter().filter(|f| f.exists()) {
        ui::item("Watching", &file.display().to_string());
    }
    ui::info("Press Ctrl+C to stop");
}
