//! The normalized fetch result.
//!
//! Every backend, whether it ran in-process, in a child process or behind a
//! socket, produces a [`NormalizedResponse`]. All classification is a pure
//! read over the struct so callers get the same answers regardless of which
//! backend serviced the request.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use super::headers::Headers;
use super::protection;

/// Content length assumed when the server sends no `Content-Length` header.
pub const DEFAULT_CONTENT_LENGTH: u64 = 100;

// ============================================================================
// Normalized Response
// ============================================================================

/// Canonical result of a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    /// Final URL after redirects.
    pub url: String,
    /// URL originally asked for.
    pub requested_url: String,
    /// HTTP status; 0 means nothing was fetched.
    pub status_code: u16,
    /// Response headers.
    pub headers: Headers,
    /// Raw body bytes.
    #[serde(skip)]
    pub body: Option<Vec<u8>>,
    /// Decoded body text.
    pub text: Option<String>,
    /// Text encoding, if known.
    pub encoding: Option<String>,
    /// Errors collected while producing this response, oldest first.
    pub errors: Vec<String>,
    /// Name of the backend that produced the response.
    pub backend: Option<String>,
}

impl NormalizedResponse {
    /// Creates an unfetched response (status 0) for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            requested_url: url.clone(),
            url,
            ..Self::default()
        }
    }

    /// Creates an unfetched response carrying a single error.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(url).with_error(error)
    }

    /// Returns a copy with a different status code.
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Returns a copy with an error appended.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Returns a copy attributed to a backend.
    #[must_use]
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    // ========================================================================
    // Status classification
    // ========================================================================

    /// True for 2xx statuses.
    pub fn is_status_ok(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// True for 3xx statuses above 300, and for 403.
    pub fn is_status_soft_redirect(&self) -> bool {
        (301..400).contains(&self.status_code) || self.status_code == 403
    }

    /// True for statuses that mean the fetch failed outright.
    pub fn is_status_hard_failure(&self) -> bool {
        !self.is_status_soft_redirect() && (self.status_code < 200 || self.status_code >= 400)
    }

    /// True unless the status is a hard failure.
    pub fn is_valid(&self) -> bool {
        !self.is_status_hard_failure()
    }

    /// Returns the `Location` header for soft redirects only.
    pub fn get_redirect_url(&self) -> Option<&str> {
        if self.is_status_soft_redirect() {
            self.headers.get("location")
        } else {
            None
        }
    }

    /// True if the response carries a bot-protection signature.
    pub fn is_protected(&self) -> bool {
        protection::is_protected(self.status_code, &self.headers)
    }

    // ========================================================================
    // Content classification
    // ========================================================================

    /// Returns a header value, ignoring case.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns the declared content length, or [`DEFAULT_CONTENT_LENGTH`].
    pub fn get_content_length(&self) -> u64 {
        self.headers
            .get("content-length")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(DEFAULT_CONTENT_LENGTH)
    }

    /// Returns the `Content-Type` header.
    pub fn get_content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Returns the `charset` parameter of the content type, unquoted.
    pub fn get_content_type_charset(&self) -> Option<String> {
        let content_type = self.get_content_type()?;
        content_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("charset") {
                return None;
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (!value.is_empty()).then(|| value.to_string())
        })
    }

    /// True if the content type looks like something textual we can process.
    ///
    /// Substring match on "text", "application" or "xml"; a missing
    /// content type is unsupported.
    pub fn is_content_type_supported(&self) -> bool {
        self.get_content_type().is_some_and(|content_type| {
            let content_type = content_type.to_ascii_lowercase();
            ["text", "application", "xml"]
                .iter()
                .any(|needle| content_type.contains(needle))
        })
    }

    /// True if the response is an HTML page.
    pub fn is_html(&self) -> bool {
        if let Some(content_type) = self.get_content_type() {
            return content_type.to_ascii_lowercase().contains("html");
        }
        self.leading_text()
            .is_some_and(|head| head.contains("<!doctype html") || head.contains("<html"))
    }

    /// True if the response is an RSS or Atom feed.
    pub fn is_rss(&self) -> bool {
        let by_type = self.get_content_type().is_some_and(|content_type| {
            let content_type = content_type.to_ascii_lowercase();
            content_type.contains("rss") || content_type.contains("atom")
        });
        by_type
            || self
                .leading_text()
                .is_some_and(|head| head.contains("<rss") || head.contains("<feed"))
    }

    /// Returns the body as text.
    ///
    /// Prefers the decoded `text`; otherwise decodes `body` using the declared
    /// charset (UTF-8 or Latin-1), falling back to lossy UTF-8.
    pub fn get_text(&self) -> Option<Cow<'_, str>> {
        if let Some(text) = &self.text {
            return Some(Cow::Borrowed(text));
        }
        let body = self.body.as_deref()?;
        let charset = self
            .encoding
            .clone()
            .or_else(|| self.get_content_type_charset())
            .map(|c| c.to_ascii_lowercase());
        match charset.as_deref() {
            Some("iso-8859-1" | "latin1" | "latin-1") => {
                Some(Cow::Owned(body.iter().map(|&b| char::from(b)).collect()))
            }
            _ => Some(String::from_utf8_lossy(body)),
        }
    }

    fn leading_text(&self) -> Option<String> {
        let text = self.get_text()?;
        let head: String = text.trim_start().chars().take(512).collect();
        Some(head.to_ascii_lowercase())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn with_status(code: u16) -> NormalizedResponse {
        NormalizedResponse::new("https://example.com").with_status(code)
    }

    fn with_header(name: &str, value: &str) -> NormalizedResponse {
        let mut response = with_status(200);
        response.headers.insert(name, value);
        response
    }

    #[test]
    fn test_validity_table() {
        for code in [200, 204, 250, 299] {
            assert!(with_status(code).is_valid(), "{code} should be valid");
            assert!(with_status(code).is_status_ok());
        }
        assert!(with_status(403).is_valid());
        assert!(with_status(403).is_status_soft_redirect());
        assert!(with_status(302).is_valid());
        for code in [0, 404, 500, 199, 300] {
            assert!(!with_status(code).is_valid(), "{code} should be invalid");
        }
    }

    #[test]
    fn test_unfetched_is_never_ok() {
        let response = NormalizedResponse::new("https://example.com");
        assert_eq!(response.status_code, 0);
        assert!(!response.is_status_ok());
        assert!(response.is_status_hard_failure());
    }

    #[test]
    fn test_content_length_sentinel() {
        assert_eq!(with_status(200).get_content_length(), DEFAULT_CONTENT_LENGTH);
        assert_eq!(with_status(200).get_content_length(), 100);
        assert_eq!(with_header("Content-Length", "2048").get_content_length(), 2048);
        assert_eq!(with_header("content-length", " 7 ").get_content_length(), 7);
        assert_eq!(with_header("content-length", "lots").get_content_length(), 100);
    }

    #[test]
    fn test_charset() {
        let response = with_header("Content-Type", "text/html; Charset=\"ISO-8859-1\"");
        assert_eq!(response.get_content_type_charset().as_deref(), Some("ISO-8859-1"));

        let response = with_header("content-type", "text/html;charset=utf-8");
        assert_eq!(response.get_content_type_charset().as_deref(), Some("utf-8"));

        assert!(with_header("content-type", "text/html").get_content_type_charset().is_none());
    }

    #[test]
    fn test_content_type_supported() {
        assert!(with_header("Content-Type", "text/html").is_content_type_supported());
        assert!(with_header("Content-Type", "application/json").is_content_type_supported());
        assert!(with_header("Content-Type", "image/svg+xml").is_content_type_supported());
        assert!(!with_header("Content-Type", "image/png").is_content_type_supported());
        assert!(!with_status(200).is_content_type_supported());
    }

    #[test]
    fn test_redirect_url_only_for_soft_redirects() {
        let mut response = with_status(301);
        response.headers.insert("Location", "https://example.com/new");
        assert_eq!(response.get_redirect_url(), Some("https://example.com/new"));

        let moved = response.clone().with_status(200);
        assert_eq!(moved.get_redirect_url(), None);
    }

    #[test]
    fn test_text_decoding() {
        let mut response = with_header("Content-Type", "text/plain; charset=iso-8859-1");
        response.body = Some(vec![0x63, 0x61, 0x66, 0xE9]);
        assert_eq!(response.get_text().as_deref(), Some("café"));

        response.text = Some("decoded".into());
        assert_eq!(response.get_text().as_deref(), Some("decoded"));
    }

    #[test]
    fn test_html_and_rss_detection() {
        assert!(with_header("Content-Type", "text/html; charset=utf-8").is_html());
        assert!(with_header("Content-Type", "application/rss+xml").is_rss());

        let mut feed = with_status(200);
        feed.text = Some("<?xml version=\"1.0\"?>\n<rss version=\"2.0\">".into());
        assert!(feed.is_rss());
        assert!(!feed.is_html());
    }

    #[test]
    fn test_derivations_copy() {
        let original = NormalizedResponse::failed("https://example.com", "boom");
        let forced = original.clone().with_status(500);
        assert_eq!(original.status_code, 0);
        assert_eq!(forced.status_code, 500);
        assert_eq!(forced.errors, vec!["boom".to_string()]);
    }
}
