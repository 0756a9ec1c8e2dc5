//! URL classification.
//!
//! An ordered pattern table maps URLs to handler kinds. The first matching
//! pattern wins and anything unmatched is [`HandlerKind::Generic`]. The table
//! is built once, on first use.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::error;

use crate::error::HandlerError;

// ============================================================================
// Handler Kind
// ============================================================================

/// Which handler services a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// A single YouTube video.
    YouTubeVideo,
    /// A YouTube channel or its feed.
    YouTubeChannel,
    /// A single Odysee video.
    OdyseeVideo,
    /// An Odysee channel or its feed.
    OdyseeChannel,
    /// A subreddit.
    RedditSubreddit,
    /// Any other page.
    Generic,
}

impl HandlerKind {
    /// Stable identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTubeVideo => "youtube_video",
            Self::YouTubeChannel => "youtube_channel",
            Self::OdyseeVideo => "odysee_video",
            Self::OdyseeChannel => "odysee_channel",
            Self::RedditSubreddit => "reddit_subreddit",
            Self::Generic => "generic",
        }
    }

    /// True for kinds whose content is fetched from a feed.
    pub fn is_channel(&self) -> bool {
        matches!(
            self,
            Self::YouTubeChannel | Self::OdyseeChannel | Self::RedditSubreddit
        )
    }

    /// All kinds, in classification order.
    pub fn all() -> &'static [HandlerKind] {
        &[
            Self::YouTubeVideo,
            Self::YouTubeChannel,
            Self::OdyseeVideo,
            Self::OdyseeChannel,
            Self::RedditSubreddit,
            Self::Generic,
        ]
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| HandlerError::UnknownKind(s.to_string()))
    }
}

// ============================================================================
// Pattern Table
// ============================================================================

/// One row of the table: a kind and the pattern that selects it.
///
/// The first capture group that participates in a match is the handler code.
#[derive(Debug)]
pub struct UrlPattern {
    /// Kind selected by this row.
    pub kind: HandlerKind,
    /// URL pattern.
    pub regex: Regex,
}

static PATTERNS: OnceLock<Vec<UrlPattern>> = OnceLock::new();

fn pattern(kind: HandlerKind, source: &str) -> Option<UrlPattern> {
    match Regex::new(source) {
        Ok(regex) => Some(UrlPattern { kind, regex }),
        Err(e) => {
            error!(kind = %kind, error = %e, "Invalid URL pattern, skipping");
            None
        }
    }
}

/// Builds the table. Order matters: videos before channels.
fn init_patterns() -> Vec<UrlPattern> {
    [
        (
            HandlerKind::YouTubeVideo,
            r"^https?://(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})",
        ),
        (
            HandlerKind::YouTubeChannel,
            r"^https?://(?:www\.|m\.)?youtube\.com/(?:channel/(UC[A-Za-z0-9_-]+)|feeds/videos\.xml\?channel_id=(UC[A-Za-z0-9_-]+)|(@[A-Za-z0-9_.-]+))",
        ),
        (
            HandlerKind::OdyseeVideo,
            r"^https?://(?:www\.)?odysee\.com/@[^/?#:]+(?::[0-9A-Za-z]+)?/([^/?#:]+)",
        ),
        (
            HandlerKind::OdyseeChannel,
            r"^https?://(?:www\.)?odysee\.com/(?:\$/rss/)?(@[^/?#:]+)(?::[0-9A-Za-z]+)?/?(?:[?#].*)?$",
        ),
        (
            HandlerKind::RedditSubreddit,
            r"^https?://(?:www\.|old\.|new\.)?reddit\.com/r/([A-Za-z0-9_]+)",
        ),
    ]
    .into_iter()
    .filter_map(|(kind, source)| pattern(kind, source))
    .collect()
}

// ============================================================================
// Classifier
// ============================================================================

/// Maps URLs to handler kinds.
pub struct UrlClassifier;

impl UrlClassifier {
    /// The pattern table, in match order.
    pub fn patterns() -> &'static [UrlPattern] {
        PATTERNS.get_or_init(init_patterns)
    }

    /// Kind of handler for `url`.
    pub fn classify(url: &str) -> HandlerKind {
        Self::classify_with_code(url).0
    }

    /// Kind of handler for `url`, plus the code captured by its pattern.
    pub fn classify_with_code(url: &str) -> (HandlerKind, Option<String>) {
        let url = url.trim();
        for row in Self::patterns() {
            if let Some(captures) = row.regex.captures(url) {
                let code = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .next()
                    .map(|m| m.as_str().to_string());
                return (row.kind, code);
            }
        }
        (HandlerKind::Generic, None)
    }
}

// ============================================================================
// Tests
// ============================================================================
