/// Parse and validate a public base URL.
///
/// Accepts an absolute path (`/`, `/app/`) or an absolute http(s) URL. The
/// value is returned as given; trailing slashes are trimmed where it is
/// substituted.
///
/// # Errors
///
/// Returns an error message if the value is empty, relative, or contains
/// whitespace.
pub fn parse_public_url(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("Public URL cannot be empty".to_string());
    }

    if s.chars().any(char::is_whitespace) {
        return Err(format!("Public URL cannot contain whitespace: '{}'", s));
    }

    let absolute = s.starts_with('/') || s.starts_with("http://") || s.starts_with("https://");
    if !absolute {
        return Err(format!(
            "Public URL must start with '/' or an http(s) scheme: '{}'",
            s
        ));
    }

    Ok(s.to_string())
}
