//! CLI output formatting tests.

use super::{JsonFormatter, TextFormatter};
use crawlkit_core::NormalizedResponse;
use crawlkit_fetch::{
    AttemptOutcome, BackendKind, EngineConfig, FetchAttempt, FetchOutcome, Mode, RobotsEntry,
};
use crawlkit_handlers::Handler;
use std::time::Duration;

fn attempt(backend: &str, kind: BackendKind, status: u16, outcome: AttemptOutcome) -> FetchAttempt {
    FetchAttempt {
        backend: backend.to_string(),
        kind,
        status_code: status,
        outcome,
        error: None,
        duration: Duration::from_millis(12),
    }
}

fn escalated_outcome() -> FetchOutcome {
    let mut response = NormalizedResponse::new("https://example.org/").with_status(200);
    response.url = "https://example.org/home".to_string();
    response.headers.insert("Content-Type", "text/html");
    response.text = Some("<p>body</p>".to_string());

    FetchOutcome {
        mode: Mode::Standard,
        response,
        attempts: vec![
            attempt(
                "requests",
                BackendKind::Http,
                403,
                AttemptOutcome::Escalated {
                    target: "headless".to_string(),
                },
            ),
            attempt("headless", BackendKind::Headless, 200, AttemptOutcome::Success),
        ],
        duration: Duration::from_millis(40),
    }
}

#[test]
fn test_text_outcome_lists_attempts() {
    let formatter = TextFormatter::new(false);
    let text = formatter.format_outcome(&escalated_outcome(), false);

    assert!(text.starts_with("✓ 200 https://example.org/home"));
    assert!(text.contains("via headless"));
    assert!(text.contains("escalated -> headless"));
    assert!(!text.contains("<p>body</p>"));
    assert!(!text.contains("\x1b["));
}

#[test]
fn test_text_outcome_with_body_and_colors() {
    let formatter = TextFormatter::new(true);
    let text = formatter.format_outcome(&escalated_outcome(), true);
    assert!(text.contains("<p>body</p>"));
    assert!(text.contains("\x1b[32m"));
}

#[test]
fn test_json_outcome_shape() {
    let formatter = JsonFormatter::new(false);
    let json = formatter.format_outcome(&escalated_outcome(), false).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["statusCode"], 200);
    assert_eq!(value["success"], true);
    assert_eq!(value["backend"], "headless");
    assert_eq!(value["mode"], "standard");
    assert_eq!(value["attempts"][0]["outcome"]["kind"], "escalated");
    assert_eq!(value["attempts"][0]["duration"], 12);
    assert!(value.get("body").is_none());
}

#[test]
fn test_robots_text_marks_matching_rule() {
    let entry = RobotsEntry::parse(
        "example.org",
        "User-agent: *\nDisallow: /private\nSitemap: https://example.org/s.xml",
        Duration::from_secs(60),
    );
    let text = TextFormatter::new(false).format_robots(&entry, "/private/a", false);
    assert!(text.contains("example.org /private/a: disallowed"));
    assert!(text.contains("* /private"));
    assert!(text.contains("Sitemap: https://example.org/s.xml"));
}

#[test]
fn test_handler_formats() {
    let handler = Handler::for_url("https://www.reddit.com/r/rust").unwrap();
    let text = TextFormatter::new(false).format_handler(&handler);
    assert!(text.starts_with("reddit_subreddit https://www.reddit.com/r/rust"));
    assert!(text.contains("fetch: https://www.reddit.com/r/rust/.rss"));

    let json = JsonFormatter::new(false).format_handler(&handler, None).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["kind"], "reddit_subreddit");
    assert_eq!(value["code"], "rust");
    assert!(value.get("properties").is_none());
}

#[test]
fn test_modes_text() {
    let text = TextFormatter::new(false).format_modes(&EngineConfig::default().modes);
    assert!(text.contains("standard"));
    assert!(text.contains("script       Script (disabled)"));
}
