//! Status inference from browser performance logs.
//!
//! WebDriver does not expose the HTTP status of a navigation. Chromium's
//! performance log does: every `Network.responseReceived` event carries the
//! response status, headers and MIME type. The document the browser ended up
//! showing is the last `text/html` response in the log.

use crawlkit_core::Headers;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Status assumed when the log holds no document response.
pub const DEFAULT_STATUS: u16 = 200;

const RESPONSE_RECEIVED: &str = "Network.responseReceived";

/// One performance log entry as returned by the driver.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    /// Log level.
    #[serde(default)]
    pub level: String,
    /// JSON-encoded DevTools event.
    pub message: String,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// The HTML document response found in a log.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentResponse {
    /// Response URL.
    pub url: String,
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
}

/// Returns the last `text/html` response in the log.
pub fn last_html_response(entries: &[LogEntry]) -> Option<DocumentResponse> {
    entries.iter().rev().find_map(|entry| {
        let event: Value = match serde_json::from_str(&entry.message) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "Skipping unparsable performance log entry");
                return None;
            }
        };
        document_response(&event)
    })
}

/// Infers the navigation status; [`DEFAULT_STATUS`] when nothing matches.
pub fn infer_status_code(entries: &[LogEntry]) -> u16 {
    last_html_response(entries).map_or(DEFAULT_STATUS, |doc| doc.status)
}

fn document_response(event: &Value) -> Option<DocumentResponse> {
    let message = event.get("message")?;
    if message.get("method")?.as_str()? != RESPONSE_RECEIVED {
        return None;
    }
    let response = message.get("params")?.get("response")?;

    let mime = response.get("mimeType").and_then(Value::as_str).unwrap_or("");
    if !mime.eq_ignore_ascii_case("text/html") {
        return None;
    }

    let status = response.get("status")?.as_f64()?;
    let headers = response
        .get("headers")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Some(DocumentResponse {
        url: response
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        status: status.clamp(0.0, f64::from(u16::MAX)) as u16,
        headers,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(method: &str, mime: &str, status: u16, url: &str) -> LogEntry {
        let event = json!({
            "message": {
                "method": method,
                "params": {
                    "type": "Document",
                    "response": {
                        "url": url,
                        "status": status,
                        "mimeType": mime,
                        "headers": {"Content-Type": mime, "Server": "test"}
                    }
                }
            },
            "webview": "abc"
        });
        LogEntry {
            level: "INFO".into(),
            message: event.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_empty_log_defaults_to_200() {
        assert_eq!(infer_status_code(&[]), 200);
    }

    #[test]
    fn test_last_html_response_wins() {
        let entries = vec![
            entry(RESPONSE_RECEIVED, "text/html", 301, "http://a/"),
            entry(RESPONSE_RECEIVED, "text/html", 404, "https://a/missing"),
            entry(RESPONSE_RECEIVED, "image/png", 200, "https://a/logo.png"),
            entry("Network.requestWillBeSent", "text/html", 500, "https://a/x"),
        ];
        let doc = last_html_response(&entries).unwrap();
        assert_eq!(doc.status, 404);
        assert_eq!(doc.url, "https://a/missing");
        assert_eq!(doc.headers.get("server"), Some("test"));
        assert_eq!(infer_status_code(&entries), 404);
    }

    #[test]
    fn test_non_html_only_defaults() {
        let entries = vec![
            entry(RESPONSE_RECEIVED, "application/json", 500, "https://a/api"),
            LogEntry {
                level: "INFO".into(),
                message: "not json".into(),
                timestamp: 0,
            },
        ];
        assert_eq!(infer_status_code(&entries), 200);
    }
}
