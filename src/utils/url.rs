//! URL utilities for consistent URL handling
//!
//! The settings store keeps the server base URL exactly as the user typed it,
//! with or without a trailing slash. These helpers make endpoint construction
//! independent of that choice.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use adricopilot::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434/api"), "http://localhost:11434/api");
/// assert_eq!(normalize_base_url("http://localhost:11434/api/"), "http://localhost:11434/api");
/// assert_eq!(normalize_base_url("http://localhost:11434/api///"), "http://localhost:11434/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use adricopilot::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/api/", "generate"),
///     "http://localhost:11434/api/generate"
/// );
/// assert_eq!(
///     construct_api_url("http://localhost:11434/api", "/generate"),
///     "http://localhost:11434/api/generate"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Parse a URL the way the HTTP client will, returning `None` when it would
/// be rejected (relative URLs, unsupported schemes, garbage).
pub fn parse_http_url(url: &str) -> Option<reqwest::Url> {
    let parsed = reqwest::Url::parse(url.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Some(parsed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:11434/api"),
            "http://localhost:11434/api"
        );

        // Single and repeated trailing slashes are removed
        assert_eq!(
            normalize_base_url("http://localhost:11434/api/"),
            "http://localhost:11434/api"
        );
        assert_eq!(
            normalize_base_url("http://localhost:11434/api///"),
            "http://localhost:11434/api"
        );

        // Surrounding whitespace from hand-edited config files
        assert_eq!(
            normalize_base_url("  http://localhost:11434/api/ \n"),
            "http://localhost:11434/api"
        );

        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("http://localhost:11434/api", "generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            construct_api_url("http://localhost:11434/api/", "generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            construct_api_url("http://localhost:11434/api/", "/generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            construct_api_url("http://10.0.0.2:8080", "api/generate"),
            "http://10.0.0.2:8080/api/generate"
        );
    }

    #[test]
    fn parse_http_url_rejects_non_http_inputs() {
        assert!(parse_http_url("http://localhost:11434/api/generate").is_some());
        assert!(parse_http_url("https://llm.example.org/api/generate").is_some());
        assert!(parse_http_url("localhost:11434/api/generate").is_none());
        assert!(parse_http_url("/api/generate").is_none());
        assert!(parse_http_url("ftp://example.org/generate").is_none());
        assert!(parse_http_url("not a url").is_none());
        assert!(parse_http_url("").is_none());
    }
}
