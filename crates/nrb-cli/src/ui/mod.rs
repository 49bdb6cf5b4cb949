//! Terminal status output.
//!
//! Short, coloured status lines on stderr for the things a developer watches while
//! `nrb dev` runs: where the server listens, when a reload went out, when the bundler
//! restarted. Diagnostics belong in `tracing`, not here.
//!
//! # Examples
//!
//! ```no_run
//! use nrb_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Dev server ready");
//! ui::item("Local", "http://localhost:3000/");
//! ui::reload("src/app.tsx changed");
//! ```

mod messages;

pub use messages::{error, info, item, reload, success, warning};

/// Check if color output should be enabled.
///
/// `NO_COLOR` beats `FORCE_COLOR`; without either, colours follow whether stderr is
/// attended.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}

/// Apply the colour decision globally.
///
/// `no_color` comes from `--no-color` and always disables colours.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && should_use_color();
    owo_colors::set_override(enabled);
    console::set_colors_enabled_stderr(enabled);
}
