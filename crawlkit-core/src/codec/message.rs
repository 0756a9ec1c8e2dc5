//! Request and response messages built from frames.
//!
//! A message is a run of field frames closed by a `commit` frame. Decoders
//! skip commands they do not know, so either side can add fields without
//! breaking older peers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::time::Duration;
use tracing::debug;

use super::frame::{Frame, decode_frames, encode_frames};
use crate::error::CodecError;
use crate::models::{FetchRequest, Headers, NormalizedResponse, SettingsMap};

/// Field (command) names used on the wire.
pub mod fields {
    /// Final URL (response) or URL to fetch (request).
    pub const URL: &str = "url";
    /// URL originally requested.
    pub const REQUESTED_URL: &str = "requested_url";
    /// Decimal HTTP status.
    pub const STATUS_CODE: &str = "status_code";
    /// JSON object of headers.
    pub const HEADERS: &str = "headers";
    /// Decoded text.
    pub const PAGE_CONTENT: &str = "page_content";
    /// Alias accepted for [`PAGE_CONTENT`].
    pub const TEXT: &str = "text";
    /// Base64 text, sent instead of [`PAGE_CONTENT`] when the text holds NUL.
    pub const PAGE_CONTENT_B64: &str = "page_content_b64";
    /// Base64 body bytes.
    pub const BINARY_CONTENT: &str = "binary_content";
    /// Text encoding.
    pub const ENCODING: &str = "encoding";
    /// JSON list of errors.
    pub const ERRORS: &str = "errors";
    /// Backend name.
    pub const CRAWLER_NAME: &str = "crawler_name";
    /// Timeout in seconds, possibly fractional.
    pub const TIMEOUT: &str = "timeout_s";
    /// User agent override.
    pub const USER_AGENT: &str = "user_agent";
    /// `True`/`False`.
    pub const SSL_VERIFY: &str = "ssl_verify";
    /// Decimal byte limit.
    pub const MAX_CONTENT_LENGTH: &str = "max_content_length";
    /// JSON object of backend settings.
    pub const SETTINGS: &str = "settings";
}

// ============================================================================
// Responses
// ============================================================================

/// Returns the frames describing a response, without the commit marker.
pub fn response_frames(response: &NormalizedResponse) -> Vec<Frame> {
    let headers = serde_json::to_string(&response.headers).unwrap_or_else(|_| "{}".into());
    let errors = serde_json::to_string(&response.errors).unwrap_or_else(|_| "[]".into());
    let body = response.body.as_deref().map(|bytes| BASE64.encode(bytes));

    let mut frames = vec![
        Frame::text(fields::URL, Some(&response.url)),
        Frame::text(fields::REQUESTED_URL, Some(&response.requested_url)),
        Frame::text(fields::STATUS_CODE, Some(&response.status_code.to_string())),
        Frame::text(fields::HEADERS, Some(&headers)),
        Frame::text(fields::BINARY_CONTENT, body.as_deref()),
        Frame::text(fields::ENCODING, response.encoding.as_deref()),
        Frame::text(fields::ERRORS, Some(&errors)),
        Frame::text(fields::CRAWLER_NAME, response.backend.as_deref()),
    ];

    // A NUL would end the frame, so such text travels as base64. Older peers
    // only see `page_content:None` and fall back to the body.
    match response.text.as_deref() {
        Some(text) if text.contains('\0') => {
            frames.push(Frame::text(fields::PAGE_CONTENT, None));
            frames.push(Frame::text(
                fields::PAGE_CONTENT_B64,
                Some(&BASE64.encode(text)),
            ));
        }
        text => frames.push(Frame::text(fields::PAGE_CONTENT, text)),
    }
    frames
}

/// Encodes a response as a committed frame stream.
pub fn encode_response(response: &NormalizedResponse) -> Vec<u8> {
    let mut frames = response_frames(response);
    frames.push(Frame::commit());
    encode_frames(&frames)
}

/// Decodes a response from a frame stream.
///
/// Never fails: malformed fields are skipped and noted in `errors`, unknown
/// fields are ignored, and a stream with no recognized field yields
/// `NormalizedResponse::default()`.
pub fn decode_response(data: &[u8]) -> NormalizedResponse {
    response_from_frames(decode_frames(data))
}

/// Builds a response from already-decoded frames, stopping at `commit`.
pub fn response_from_frames(frames: impl IntoIterator<Item = Frame>) -> NormalizedResponse {
    let mut response = NormalizedResponse::default();
    let mut protocol_errors = Vec::new();
    let mut recognized = 0usize;
    let mut requested_url_seen = false;

    for frame in frames {
        if frame.is_commit() {
            break;
        }
        match apply_response_field(&mut response, &frame) {
            Ok(true) => {
                recognized += 1;
                requested_url_seen |= frame.command == fields::REQUESTED_URL;
            }
            Ok(false) => debug!(command = %frame.command, "Skipping unknown frame"),
            Err(e) => {
                debug!(error = %e, "Skipping malformed frame");
                protocol_errors.push(format!("Protocol error: {e}"));
            }
        }
    }

    if recognized == 0 {
        return NormalizedResponse::default();
    }
    if !requested_url_seen {
        response.requested_url = response.url.clone();
    }
    response.errors.extend(protocol_errors);
    response
}

/// Applies one frame. Returns `Ok(false)` for unknown commands.
fn apply_response_field(
    response: &mut NormalizedResponse,
    frame: &Frame,
) -> Result<bool, CodecError> {
    match frame.command.as_str() {
        fields::URL => response.url = frame.optional_text()?.unwrap_or_default(),
        fields::REQUESTED_URL => {
            response.requested_url = frame.optional_text()?.unwrap_or_default();
        }
        fields::STATUS_CODE => {
            let text = frame.payload_str()?;
            response.status_code = text
                .trim()
                .parse()
                .map_err(|_| malformed(frame, format!("not a status code: {text:?}")))?;
        }
        fields::HEADERS => {
            if let Some(json) = frame.optional_text()? {
                response.headers = serde_json::from_str::<Headers>(&json)
                    .map_err(|e| malformed(frame, e.to_string()))?;
            }
        }
        fields::PAGE_CONTENT | fields::TEXT => response.text = frame.optional_text()?,
        fields::PAGE_CONTENT_B64 => {
            if let Some(encoded) = frame.optional_text()? {
                let bytes = BASE64
                    .decode(encoded.trim())
                    .map_err(|e| malformed(frame, e.to_string()))?;
                let text =
                    String::from_utf8(bytes).map_err(|e| malformed(frame, e.to_string()))?;
                response.text = Some(text);
            }
        }
        fields::BINARY_CONTENT => {
            response.body = match frame.optional_text()? {
                Some(encoded) => Some(
                    BASE64
                        .decode(encoded.trim())
                        .map_err(|e| malformed(frame, e.to_string()))?,
                ),
                None => None,
            };
        }
        fields::ENCODING => response.encoding = frame.optional_text()?,
        fields::ERRORS => {
            if let Some(json) = frame.optional_text()? {
                response.errors = serde_json::from_str(&json)
                    .map_err(|e| malformed(frame, e.to_string()))?;
            }
        }
        fields::CRAWLER_NAME => response.backend = frame.optional_text()?,
        _ => return Ok(false),
    }
    Ok(true)
}

// ============================================================================
// Requests
// ============================================================================

/// Encodes a fetch request and its timeout as a committed frame stream.
pub fn encode_request(request: &FetchRequest, timeout: Duration) -> Vec<u8> {
    let settings = serde_json::to_string(&request.settings).unwrap_or_else(|_| "{}".into());
    let frames = [
        Frame::text(fields::URL, Some(&request.url)),
        Frame::text(fields::TIMEOUT, Some(&timeout.as_secs_f64().to_string())),
        Frame::text(fields::CRAWLER_NAME, request.backend.as_deref()),
        Frame::text(fields::USER_AGENT, request.user_agent.as_deref()),
        Frame::text(
            fields::SSL_VERIFY,
            Some(if request.ssl_verify { "True" } else { "False" }),
        ),
        Frame::text(
            fields::MAX_CONTENT_LENGTH,
            Some(&request.max_content_length.to_string()),
        ),
        Frame::text(fields::SETTINGS, Some(&settings)),
        Frame::commit(),
    ];
    encode_frames(&frames)
}

/// Builds a request from decoded frames, stopping at `commit`.
///
/// Unknown fields are skipped. Returns the request and the requested timeout
/// (`None` when the peer did not send one).
///
/// # Errors
///
/// Fails if a known field is malformed or no `url` was sent.
pub fn request_from_frames(
    frames: impl IntoIterator<Item = Frame>,
) -> Result<(FetchRequest, Option<Duration>), CodecError> {
    let mut request = FetchRequest::default();
    let mut timeout = None;
    let mut url_seen = false;

    for frame in frames {
        if frame.is_commit() {
            break;
        }
        match frame.command.as_str() {
            fields::URL => {
                request.url = frame
                    .optional_text()?
                    .ok_or(CodecError::MissingField(fields::URL))?;
                url_seen = true;
            }
            fields::TIMEOUT => {
                let text = frame.payload_str()?;
                let secs: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| malformed(&frame, format!("not a number: {text:?}")))?;
                timeout = Some(Duration::from_secs_f64(secs.max(0.0)));
            }
            fields::CRAWLER_NAME => request.backend = frame.optional_text()?,
            fields::USER_AGENT => request.user_agent = frame.optional_text()?,
            fields::SSL_VERIFY => {
                let text = frame.payload_str()?;
                request.ssl_verify = !matches!(
                    text.trim().to_ascii_lowercase().as_str(),
                    "false" | "0" | "no"
                );
            }
            fields::MAX_CONTENT_LENGTH => {
                let text = frame.payload_str()?;
                request.max_content_length = text
                    .trim()
                    .parse()
                    .map_err(|_| malformed(&frame, format!("not a length: {text:?}")))?;
            }
            fields::SETTINGS => {
                if let Some(json) = frame.optional_text()? {
                    request.settings = serde_json::from_str::<SettingsMap>(&json)
                        .map_err(|e| malformed(&frame, e.to_string()))?;
                }
            }
            other => debug!(command = %other, "Skipping unknown request frame"),
        }
    }

    if !url_seen {
        return Err(CodecError::MissingField(fields::URL));
    }
    Ok((request, timeout))
}

/// Decodes a request from a complete buffer.
///
/// # Errors
///
/// See [`request_from_frames`].
pub fn decode_request(data: &[u8]) -> Result<(FetchRequest, Option<Duration>), CodecError> {
    request_from_frames(decode_frames(data))
}

fn malformed(frame: &Frame, reason: String) -> CodecError {
    CodecError::MalformedField {
        field: frame.command.clone(),
        reason,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> NormalizedResponse {
        let mut response = NormalizedResponse::new("https://example.com/start");
        response.url = "https://example.com/final".into();
        response.status_code = 200;
        response.headers.insert("Content-Type", "text/html; charset=utf-8");
        response.headers.insert("Content-Length", "24");
        response.body = Some(b"<html>\0binary\xff</html>".to_vec());
        response.text = Some("<html>hello: world</html>".into());
        response.encoding = Some("utf-8".into());
        response.errors = vec!["first".into(), "second".into()];
        response.backend = Some("requests".into());
        response
    }

    #[test]
    fn test_response_roundtrip() {
        let response = sample_response();
        assert_eq!(decode_response(&encode_response(&response)), response);
    }

    #[test]
    fn test_absent_values_roundtrip() {
        let mut response = sample_response();
        response.text = None;
        response.encoding = None;
        response.backend = None;
        let decoded = decode_response(&encode_response(&response));
        assert_eq!(decoded.text, None);
        assert_eq!(decoded.encoding, None);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_unknown_frames_are_skipped() {
        let mut data = b"future_field:whatever\0".to_vec();
        data.extend(encode_response(&sample_response()));
        assert_eq!(decode_response(&data), sample_response());
    }

    #[test]
    fn test_minimal_foreign_stream() {
        let data = b"url:https://a.example\0status_code:404\0headers:{\"Server\":\"x\"}\0page_content:None\0";
        let response = decode_response(data);
        assert_eq!(response.url, "https://a.example");
        assert_eq!(response.requested_url, "https://a.example");
        assert_eq!(response.status_code, 404);
        assert_eq!(response.headers.get("server"), Some("x"));
        assert_eq!(response.text, None);
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_no_recognized_frames_yields_default() {
        assert_eq!(decode_response(b"bogus:1\0noise"), NormalizedResponse::default());
        assert_eq!(decode_response(b""), NormalizedResponse::default());
    }

    #[test]
    fn test_malformed_status_is_reported_not_fatal() {
        let response = decode_response(b"url:https://a\0status_code:abc\0");
        assert_eq!(response.url, "https://a");
        assert_eq!(response.status_code, 0);
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].starts_with("Protocol error"));
    }

    #[test]
    fn test_request_roundtrip() {
        let mut settings = SettingsMap::new();
        settings.insert("driver".into(), serde_json::json!("chromedriver"));
        let request = FetchRequest::new("https://example.com")
            .with_user_agent("agent/1.0")
            .with_ssl_verify(false)
            .with_max_content_length(1234)
            .with_backend("headless", settings);

        let data = encode_request(&request, Duration::from_secs(20));
        let (decoded, timeout) = decode_request(&data).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_request_keeps_fractional_timeout() {
        let request = FetchRequest::new("https://example.com");

        let (_, timeout) = decode_request(&encode_request(&request, Duration::from_millis(500))).unwrap();
        assert_eq!(timeout, Some(Duration::from_millis(500)));

        let (_, timeout) = decode_request(&encode_request(&request, Duration::from_millis(2500))).unwrap();
        assert_eq!(timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_text_with_nul_roundtrip() {
        let mut response = sample_response();
        response.text = Some("a\0b".into());

        let data = encode_response(&response);
        assert!(data.windows(b"page_content_b64:".len()).any(|w| w == b"page_content_b64:"));
        assert_eq!(decode_response(&data), response);
    }

    #[test]
    fn test_older_stream_without_b64_text() {
        let data = b"url:https://a\0page_content:None\0";
        assert_eq!(decode_response(data).text, None);
    }

    #[test]
    fn test_request_requires_url() {
        assert_eq!(
            decode_request(b"timeout_s:10\0").unwrap_err(),
            CodecError::MissingField("url")
        );
    }
}
