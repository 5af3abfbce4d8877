//! Resolution of manifest entries and request URLs against the app origin.

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse the origin every relative entry resolves against.
pub fn parse_origin(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

/// Resolve a manifest entry or request path to an absolute URL.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Join relative entries (`/`, `/index.html`) onto the origin
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(origin: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = if trimmed.contains("://") {
        url::Url::parse(trimmed)
    } else {
        origin.join(trimmed)
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    normalize(parsed)
}

/// Resolve every manifest entry, failing on the first bad one.
pub fn resolve_manifest(origin: &url::Url, entries: &[String]) -> Result<Vec<url::Url>, UrlError> {
    entries.iter().map(|entry| resolve(origin, entry)).collect()
}

fn normalize(mut parsed: url::Url) -> Result<url::Url, UrlError> {
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> url::Url {
        parse_origin("http://localhost:3000/").unwrap()
    }

    #[test]
    fn test_resolve_root() {
        let url = resolve(&origin(), "/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve(&origin(), "/assets/styles/main.css").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/assets/styles/main.css");
    }

    #[test]
    fn test_resolve_absolute_url_lowercases_host() {
        let url = resolve(&origin(), "https://CDN.Example.com/icon.png").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_removes_fragment_keeps_query() {
        let url = resolve(&origin(), "/index.html?v=2#top").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("v=2"));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&origin(), "ftp://example.com/video.webm");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_parse_origin_rejects_file_scheme() {
        assert!(matches!(parse_origin("file:///srv/www/"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_manifest() {
        let entries = vec!["/".to_string(), "/index.html".to_string(), "/service-worker.js".to_string()];
        let urls = resolve_manifest(&origin(), &entries).unwrap();
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[2].path(), "/service-worker.js");
    }
}
