//! Error page shown instead of the entry document while the bundler reports a
//! build failure.
//!
//! The page carries the reload bootstrap, so the browser reloads on its own as
//! soon as the next successful build is broadcast.

use minijinja::{context, Environment};

use crate::dev::RELOAD_JS;

const TEMPLATE_NAME: &str = "error.html";

const TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Build error</title>
<script>{{ reload_js|safe }}</script>
<style>
body { margin: 0; padding: 2rem; background: #1e1e1e; color: #f0f0f0; font-family: ui-monospace, monospace; }
pre { white-space: pre-wrap; color: #ff8a80; }
</style>
</head>
<body>
<pre>{{ message }}</pre>
</body>
</html>
"#;

/// Render the error page around the bundler's plain-text output.
///
/// `message` is HTML-escaped; the reload script is embedded verbatim.
pub fn render(message: &str) -> String {
    let mut env = Environment::new();
    let rendered = env
        .add_template(TEMPLATE_NAME, TEMPLATE)
        .and_then(|()| env.get_template(TEMPLATE_NAME))
        .and_then(|tmpl| {
            tmpl.render(context! {
                reload_js => RELOAD_JS,
                message => message,
            })
        });

    match rendered {
        Ok(html) => html,
        Err(err) => {
            tracing::warn!(error = %err, "failed to render error page");
            format!(
                "<!doctype html><head><meta charset=utf-8><title>error</title>\
                 <script>{}</script></head><body><pre>Error: cannot build app</pre></body>",
                RELOAD_JS
            )
        }
    }
}
