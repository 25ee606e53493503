//! URL resolution for cache keys and same-origin checks.

use url::Url;

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

/// Parse the site origin. Any path, query or fragment is dropped.
pub fn parse_origin(input: &str) -> Result<Url, UrlError> {
    let mut origin = Url::parse(input.trim()).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    check_scheme(&origin)?;
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    Ok(origin)
}

/// Resolve a request target against the site origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Absolute URLs are parsed as-is; anything else is joined onto `origin`
/// 3. Host is lowercased and unsafe path characters percent-encoded (by `url`)
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = if trimmed.contains("://") { Url::parse(trimmed) } else { origin.join(trimmed) };
    let mut resolved = parsed.map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    check_scheme(&resolved)?;
    resolved.set_fragment(None);

    Ok(resolved)
}

/// Same scheme, host and port.
pub fn is_same_origin(url: &Url, origin: &Url) -> bool {
    url.origin() == origin.origin()
}

fn check_scheme(url: &Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
