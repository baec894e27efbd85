//! URL canonicalization for consistent cache keys.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string, resolving relative references against `base`.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve against `base` (absolute inputs are kept as-is)
/// 3. Reject anything but http/https
/// 4. Lowercase the host
/// 5. Remove fragment (#...), keep query string intact
pub fn canonicalize(input: &str, base: &Url) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether `url` shares scheme, host and port with `origin`.
pub fn same_origin(url: &Url, origin: &Url) -> bool {
    url.origin() == origin.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://notes.example.com/").unwrap()
    }

    #[test]
    fn test_canonicalize_relative() {
        let url = canonicalize("/api/notes", &base()).unwrap();
        assert_eq!(url.as_str(), "https://notes.example.com/api/notes");
    }

    #[test]
    fn test_canonicalize_absolute_keeps_host() {
        let url = canonicalize("https://cdn.example.com/a.css", &base()).unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM/x", &base()).unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment_preserve_query() {
        let url = canonicalize("/notes?id=3#edit", &base()).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("id=3"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  /index.html  ", &base()).unwrap();
        assert_eq!(url.as_str(), "https://notes.example.com/index.html");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd", &base());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));

        let result = canonicalize("data:text/plain,hi", &base());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("", &base()), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("   ", &base()), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin() {
        let origin = base();
        assert!(same_origin(&Url::parse("https://notes.example.com/a").unwrap(), &origin));
        assert!(!same_origin(&Url::parse("http://notes.example.com/a").unwrap(), &origin));
        assert!(!same_origin(&Url::parse("https://notes.example.com:8443/a").unwrap(), &origin));
    }
}
