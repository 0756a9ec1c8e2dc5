//! Per-URL handlers.
//!
//! A [`Handler`] knows, for one classified URL, which code identifies it,
//! which URL actually has to be fetched (channels resolve to their feeds),
//! and how to turn the fetched response into [`PageProperties`].

use crawlkit_core::NormalizedResponse;
use crawlkit_fetch::{Mode, PageSource};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::classifier::{HandlerKind, UrlClassifier};
use crate::error::HandlerError;
use crate::html::{self, PageProperties};

/// A fetched page and the metadata derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerPage {
    /// Handler kind that produced the page.
    pub kind: HandlerKind,
    /// The response as returned by the page source.
    pub response: NormalizedResponse,
    /// Derived metadata.
    pub properties: PageProperties,
}

/// Handler bound to one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    kind: HandlerKind,
    url: String,
    code: Option<String>,
}

impl Handler {
    /// Classifies `url` and binds the matching handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidUrl`] if `url` is not an absolute URL.
    pub fn for_url(url: &str) -> Result<Self, HandlerError> {
        let url = url.trim();
        Url::parse(url).map_err(|e| HandlerError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let (kind, code) = UrlClassifier::classify_with_code(url);
        Ok(Self {
            kind,
            url: url.to_string(),
            code,
        })
    }

    /// Kind of this handler.
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// URL the handler was created for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Video id, channel id or handle, or subreddit name.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// URL to fetch for this handler.
    pub fn fetch_url(&self) -> String {
        let Some(code) = self.code() else {
            return self.url.clone();
        };
        match self.kind {
            HandlerKind::YouTubeVideo => format!("https://www.youtube.com/watch?v={code}"),
            // Handles need the channel page to learn the channel id.
            HandlerKind::YouTubeChannel if code.starts_with('@') => self.url.clone(),
            HandlerKind::YouTubeChannel => {
                format!("https://www.youtube.com/feeds/videos.xml?channel_id={code}")
            }
            HandlerKind::OdyseeChannel => format!("https://odysee.com/$/rss/{code}"),
            HandlerKind::RedditSubreddit => format!("https://www.reddit.com/r/{code}/.rss"),
            HandlerKind::OdyseeVideo | HandlerKind::Generic => self.url.clone(),
        }
    }

    /// Canonical link for this handler's content.
    pub fn link(&self) -> String {
        match (self.kind, self.code()) {
            (HandlerKind::YouTubeVideo, Some(code)) => format!("https://www.youtube.com/watch?v={code}"),
            (HandlerKind::YouTubeChannel, Some(code)) if code.starts_with('@') => {
                format!("https://www.youtube.com/{code}")
            }
            (HandlerKind::YouTubeChannel, Some(code)) => format!("https://www.youtube.com/channel/{code}"),
            (HandlerKind::OdyseeChannel, Some(code)) => format!("https://odysee.com/{code}"),
            (HandlerKind::RedditSubreddit, Some(code)) => format!("https://www.reddit.com/r/{code}/"),
            _ => self.url.clone(),
        }
    }

    /// Fetches through `source` and derives the page's properties.
    ///
    /// Never fails: an invalid response yields properties carrying only what
    /// the handler knows without fetching.
    #[instrument(skip(self, source), fields(kind = %self.kind, url = %self.url))]
    pub async fn load(&self, source: &dyn PageSource, mode: Mode) -> HandlerPage {
        let fetch_url = self.fetch_url();
        let response = source.fetch_page(&fetch_url, mode).await;

        let mut properties = PageProperties::default();
        if response.is_valid() {
            if let Some(text) = response.get_text() {
                properties = if response.is_rss() {
                    html::feed_properties(&text)
                } else {
                    html::page_properties(&text)
                };
            }
        } else {
            debug!(status = response.status_code, "Response not valid, using defaults");
        }

        properties.link = Some(self.link());
        properties.feed_url = self.feed_url(&fetch_url, properties.feed_url.take(), &response);
        properties.merge_missing(self.known_properties());

        HandlerPage {
            kind: self.kind,
            response,
            properties,
        }
    }

    /// Properties known from the URL alone.
    fn known_properties(&self) -> PageProperties {
        let thumbnail = match (self.kind, self.code()) {
            (HandlerKind::YouTubeVideo, Some(code)) => {
                Some(format!("https://i.ytimg.com/vi/{code}/hqdefault.jpg"))
            }
            _ => None,
        };
        PageProperties {
            thumbnail,
            ..PageProperties::default()
        }
    }

    /// Feed URL: the fetched feed for channel kinds, else the page's alternate link resolved.
    fn feed_url(
        &self,
        fetch_url: &str,
        found: Option<String>,
        response: &NormalizedResponse,
    ) -> Option<String> {
        if (self.kind.is_channel() && fetch_url != self.url) || response.is_rss() {
            return Some(fetch_url.to_string());
        }
        let found = found?;
        let base = if response.url.is_empty() {
            fetch_url
        } else {
            response.url.as_str()
        };
        match Url::parse(base).and_then(|base| base.join(&found)) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(_) => Some(found),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
