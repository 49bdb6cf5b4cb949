//! Status message functions for terminal output.

use owo_colors::{OwoColorize, Stream::Stderr};

/// Print a success message to stderr.
///
/// ```no_run
/// use nrb_cli::ui::success;
///
/// success("Dev server ready");
/// ```
pub fn success(message: &str) {
    eprintln!(
        "{} {}",
        "✓".if_supports_color(Stderr, |s| s.green().bold().to_string()),
        message
    );
}

/// Print an info message to stderr.
pub fn info(message: &str) {
    eprintln!(
        "{} {}",
        "ℹ".if_supports_color(Stderr, |s| s.blue().bold().to_string()),
        message
    );
}

/// Print a warning message to stderr.
///
/// ```no_run
/// use nrb_cli::ui::warning;
///
/// warning("Port 3000 is in use, serving on 51234 instead");
/// ```
pub fn warning(message: &str) {
    eprintln!(
        "{} {}",
        "⚠".if_supports_color(Stderr, |s| s.yellow().bold().to_string()),
        message.if_supports_color(Stderr, |s| s.yellow())
    );
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        "✗".if_supports_color(Stderr, |s| s.red().bold().to_string()),
        message.if_supports_color(Stderr, |s| s.red())
    );
}

/// Print a reload notice to stderr.
pub fn reload(message: &str) {
    eprintln!(
        "{} {}",
        "↻".if_supports_color(Stderr, |s| s.cyan().bold().to_string()),
        message.if_supports_color(Stderr, |s| s.dimmed())
    );
}

/// Print an indented `label: value` line, used under a heading.
///
/// ```no_run
/// use nrb_cli::ui::item;
///
/// item("Local", "http://localhost:3000/");
/// ```
pub fn item(label: &str, value: &str) {
    eprintln!(
        "  {} {}",
        format!("{label}:").if_supports_color(Stderr, |s| s.dimmed()),
        value.if_supports_color(Stderr, |s| s.cyan())
    );
}
