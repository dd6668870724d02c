//! Resolution of page-relative resource identifiers into cache identities.

use url::{ParseError, Url};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a resource identifier seen by the page against `origin`.
///
/// Absolute URLs are taken as-is; anything else (`/index.html`, `chat/42`,
/// `?tab=1`) is joined onto the origin. Only `http(s)` survives. The fragment
/// is dropped and the query kept verbatim, so `/a#x` and `/a#y` are one entry.
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => {
            origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }
    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve(&origin(), "/chat/42#latest").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/chat/42");
    }

    #[test]
    fn test_resolve_relative_to_origin_path() {
        let origin = Url::parse("https://chat.example.com/app/").unwrap();
        assert_eq!(resolve(&origin, "profile.html").unwrap().as_str(), "https://chat.example.com/app/profile.html");
        assert_eq!(resolve(&origin, "?tab=1").unwrap().as_str(), "https://chat.example.com/app/?tab=1");
    }

    #[test]
    fn test_resolve_absolute_keeps_host() {
        let url = resolve(&origin(), "  https://Res.Cloudinary.com/demo/image.png#top ").unwrap();
        assert_eq!(url.as_str(), "https://res.cloudinary.com/demo/image.png");
    }

    #[test]
    fn test_resolve_keeps_query_order() {
        let url = resolve(&origin(), "https://fonts.googleapis.com/css2?family=Inter&display=swap").unwrap();
        assert_eq!(url.query(), Some("family=Inter&display=swap"));
    }

    #[test]
    fn test_resolve_fragments_share_identity() {
        let a = resolve(&origin(), "/mobile.html#chat").unwrap();
        let b = resolve(&origin(), "http://localhost:8080/mobile.html").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        assert!(matches!(resolve(&origin(), "data:text/plain,hi"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(resolve(&origin(), "file:///etc/passwd"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), ""), Err(UrlError::Empty)));
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_invalid() {
        assert!(matches!(resolve(&origin(), "http://[::1"), Err(UrlError::InvalidUrl(_))));
    }
}
