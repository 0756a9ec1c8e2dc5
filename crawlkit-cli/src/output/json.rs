//! JSON output formatting.

use anyhow::Result;
use crawlkit_core::Headers;
use crawlkit_fetch::{FetchAttempt, FetchOutcome, RobotsEntry};
use crawlkit_handlers::{Handler, HandlerKind, HandlerPage, PageProperties};
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a fetch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutput<'a> {
    pub url: &'a str,
    pub requested_url: &'a str,
    pub status_code: u16,
    pub success: bool,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<&'a str>,
    pub duration_ms: u128,
    pub headers: &'a Headers,
    pub errors: &'a [String],
    pub attempts: &'a [FetchAttempt],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// JSON output for a robots decision.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsOutput<'a> {
    pub path: &'a str,
    pub allowed: bool,
    pub entry: &'a RobotsEntry,
}

/// JSON output for a classified URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyOutput<'a> {
    pub url: &'a str,
    pub kind: HandlerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'a str>,
    pub fetch_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<&'a PageProperties>,
}

// ============================================================================
// Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Serializes any value with the configured layout.
    pub fn format<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(serde_json::to_string(value)?)
        }
    }

    /// Formats a fetch outcome.
    pub fn format_outcome(&self, outcome: &FetchOutcome, include_body: bool) -> Result<String> {
        let response = &outcome.response;
        let output = FetchOutput {
            url: &response.url,
            requested_url: &response.requested_url,
            status_code: response.status_code,
            success: outcome.is_success(),
            mode: outcome.mode.to_string(),
            backend: outcome.successful_backend(),
            duration_ms: outcome.duration.as_millis(),
            headers: &response.headers,
            errors: &response.errors,
            attempts: &outcome.attempts,
            body: include_body
                .then(|| response.get_text().map(std::borrow::Cow::into_owned))
                .flatten(),
        };
        self.format(&output)
    }

    /// Formats a robots decision.
    pub fn format_robots(&self, entry: &RobotsEntry, path: &str, allowed: bool) -> Result<String> {
        self.format(&RobotsOutput {
            path,
            allowed,
            entry,
        })
    }

    /// Formats a handler, with the loaded page when there is one.
    pub fn format_handler(&self, handler: &Handler, page: Option<&HandlerPage>) -> Result<String> {
        self.format(&classify_output(handler, page))
    }

    /// Formats several handlers as one array.
    pub fn format_handlers(&self, entries: &[(Handler, Option<HandlerPage>)]) -> Result<String> {
        let outputs: Vec<ClassifyOutput<'_>> = entries
            .iter()
            .map(|(handler, page)| classify_output(handler, page.as_ref()))
            .collect();
        self.format(&outputs)
    }
}

fn classify_output<'a>(handler: &'a Handler, page: Option<&'a HandlerPage>) -> ClassifyOutput<'a> {
    ClassifyOutput {
        url: handler.url(),
        kind: handler.kind(),
        code: handler.code(),
        fetch_url: handler.fetch_url(),
        status_code: page.map(|p| p.response.status_code),
        properties: page.map(|p| &p.properties),
    }
}
