//! Text output formatting with colors.

use crawlkit_fetch::{AttemptOutcome, FetchAttempt, FetchOutcome, Mode, ModeChain, RobotsEntry};
use crawlkit_handlers::{Handler, HandlerPage, PageProperties};
use std::collections::BTreeMap;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    // ========================================================================
    // Fetch
    // ========================================================================

    /// Formats a fetch outcome: summary line, attempts, errors, optional body.
    pub fn format_outcome(&self, outcome: &FetchOutcome, show_body: bool) -> String {
        let response = &outcome.response;
        let mut lines = Vec::new();

        let (mark, color) = if outcome.is_success() {
            ("✓", GREEN)
        } else {
            ("✗", RED)
        };
        let via = outcome.successful_backend().unwrap_or("no backend");
        lines.push(format!(
            "{} {} {}",
            self.color(mark, color),
            self.bold(&response.status_code.to_string()),
            response.url
        ));
        lines.push(self.dim(&format!(
            "  mode {} via {via} in {}ms",
            outcome.mode,
            outcome.duration.as_millis()
        )));

        if let Some(content_type) = response.get_content_type() {
            lines.push(format!("  Content-Type: {content_type}"));
        }
        if let Some(redirect) = response.get_redirect_url() {
            lines.push(format!("  Location: {redirect}"));
        }

        if outcome.attempts.len() > 1 || !outcome.is_success() {
            lines.push(String::new());
            lines.push(self.bold("Attempts"));
            for (i, attempt) in outcome.attempts.iter().enumerate() {
                lines.push(self.format_attempt(i + 1, attempt));
            }
        }

        if !response.errors.is_empty() {
            lines.push(String::new());
            lines.push(self.bold("Errors"));
            for error in &response.errors {
                lines.push(format!("  - {}", self.color(error, RED)));
            }
        }

        if show_body {
            if let Some(text) = response.get_text() {
                lines.push(String::new());
                lines.push(text.into_owned());
            }
        }

        lines.join("\n")
    }

    /// Formats one attempt line.
    pub fn format_attempt(&self, index: usize, attempt: &FetchAttempt) -> String {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Success => self.color("success", GREEN),
            AttemptOutcome::Escalated { target } => {
                self.color(&format!("escalated -> {target}"), YELLOW)
            }
            AttemptOutcome::ContentRejected => self.color("content rejected", YELLOW),
            AttemptOutcome::Failed => self.color("failed", RED),
        };
        format!(
            "  {index}. {:<12} {:<9} {:>3}  {outcome} {}",
            attempt.backend,
            attempt.kind.as_str(),
            attempt.status_code,
            self.dim(&format!("({}ms)", attempt.duration.as_millis()))
        )
    }

    // ========================================================================
    // Robots
    // ========================================================================

    /// Formats a robots decision.
    pub fn format_robots(&self, entry: &RobotsEntry, path: &str, allowed: bool) -> String {
        let mut lines = Vec::new();
        let verdict = if allowed {
            self.color("allowed", GREEN)
        } else {
            self.color("disallowed", RED)
        };
        lines.push(format!("{} {path}: {verdict}", self.bold(&entry.domain)));
        lines.push(self.dim(&format!(
            "  fetched {}, expires {}",
            entry.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        )));

        if let Some(delay) = entry.crawl_delay {
            lines.push(format!("  Crawl-delay: {delay}s"));
        }
        if entry.disallow_rules.is_empty() {
            lines.push("  No disallow rules".to_string());
        } else {
            lines.push("  Disallow:".to_string());
            for rule in &entry.disallow_rules {
                let marker = if path.starts_with(rule.as_str()) { "*" } else { " " };
                lines.push(format!("   {marker} {rule}"));
            }
        }
        for sitemap in &entry.sitemaps {
            lines.push(format!("  Sitemap: {sitemap}"));
        }
        lines.join("\n")
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Formats a handler without fetching.
    pub fn format_handler(&self, handler: &Handler) -> String {
        let mut lines = vec![format!("{} {}", self.color(handler.kind().as_str(), CYAN), handler.url())];
        if let Some(code) = handler.code() {
            lines.push(format!("  code:  {code}"));
        }
        lines.push(format!("  fetch: {}", handler.fetch_url()));
        lines.join("\n")
    }

    /// Formats a loaded page.
    pub fn format_page(&self, handler: &Handler, page: &HandlerPage) -> String {
        let mut lines = vec![self.format_handler(handler)];
        lines.push(format!("  status: {}", page.response.status_code));
        lines.extend(self.format_properties(&page.properties));
        lines.join("\n")
    }

    fn format_properties(&self, properties: &PageProperties) -> Vec<String> {
        [
            ("title", &properties.title),
            ("description", &properties.description),
            ("language", &properties.language),
            ("link", &properties.link),
            ("thumbnail", &properties.thumbnail),
            ("feed", &properties.feed_url),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(|value| format!("  {}: {value}", self.dim(label)))
        })
        .collect()
    }

    // ========================================================================
    // Modes
    // ========================================================================

    /// Formats the configured chains.
    pub fn format_modes(&self, modes: &BTreeMap<Mode, ModeChain>) -> String {
        let mut lines = Vec::new();
        for (mode, chain) in modes {
            lines.push(self.bold(mode.as_str()));
            if chain.is_empty() {
                lines.push(self.dim("  (empty)"));
            }
            for (i, descriptor) in chain.iter().enumerate() {
                let state = if descriptor.enabled {
                    String::new()
                } else {
                    format!(" {}", self.dim("(disabled)"))
                };
                lines.push(format!(
                    "  {}. {:<12} {}{state}",
                    i + 1,
                    descriptor.name,
                    descriptor.kind.display_name()
                ));
            }
        }
        lines.join("\n")
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.color(text, BOLD)
    }

    fn dim(&self, text: &str) -> String {
        self.color(text, DIM)
    }
}
