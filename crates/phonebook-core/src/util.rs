//! Small text and URL helpers shared by the config, backend, and CLI layers.

/// Trim optional text, mapping blanks to `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Validate a base URL and strip trailing slashes.
pub fn normalize_base_url(raw: &str, field: &str) -> Result<String, String> {
    let value = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| format!("{field} must not be empty"))?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(format!("{field} must include http:// or https://"))
    }
}

/// Shorten response bodies for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_base_url_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url(" http://localhost:3000/api/ ", "api_base_url"),
            Ok("http://localhost:3000/api".to_string())
        );
    }

    #[test]
    fn normalize_base_url_requires_scheme() {
        assert!(normalize_base_url("localhost:3000", "api_base_url").is_err());
        assert!(normalize_base_url("", "api_base_url").is_err());
    }

    #[test]
    fn compact_text_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(compact_text(&body).len(), 180);
    }
}
