//! Per-domain robots.txt cache.
//!
//! Entries are fetched lazily through a [`PageSource`] on the first question
//! about a domain, reused until their ttl runs out, and evicted oldest-first
//! when the cache grows past its capacity. A robots.txt that cannot be
//! fetched or parsed allows everything, and that answer is cached too.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use url::Url;

use crate::chain::Mode;
use crate::config::{EngineConfig, ROBOTS_AGENT};
use crate::error::{FetchError, HttpError};
use crate::orchestrator::PageSource;

// ============================================================================
// Robots Entry
// ============================================================================

/// Parsed robots.txt for one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotsEntry {
    /// `host[:port]` the entry belongs to.
    pub domain: String,
    /// Disallowed path prefixes, in file order.
    pub disallow_rules: Vec<String>,
    /// Sitemap URLs listed anywhere in the file.
    pub sitemaps: Vec<String>,
    /// Requested delay between requests, in seconds.
    pub crawl_delay: Option<f64>,
    /// When the entry was fetched.
    pub fetched_at: DateTime<Utc>,
    /// When the entry stops being used.
    pub expires_at: DateTime<Utc>,
}

impl RobotsEntry {
    /// An entry that allows everything.
    pub fn allow_all(domain: impl Into<String>, ttl: Duration) -> Self {
        let fetched_at = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            domain: domain.into(),
            disallow_rules: Vec::new(),
            sitemaps: Vec::new(),
            crawl_delay: None,
            fetched_at,
            expires_at,
        }
    }

    /// Parses robots.txt content.
    ///
    /// Rules apply from groups whose `User-agent` is `*` or matches our own
    /// agent token. An empty `Disallow:` allows everything and adds no rule.
    pub fn parse(domain: impl Into<String>, content: &str, ttl: Duration) -> Self {
        let mut entry = Self::allow_all(domain, ttl);

        let mut group_applies = false;
        let mut in_agent_lines = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // Consecutive agent lines share one group.
                    if !in_agent_lines {
                        group_applies = false;
                    }
                    in_agent_lines = true;
                    group_applies |= agent_matches(value);
                }
                "disallow" => {
                    in_agent_lines = false;
                    if group_applies && !value.is_empty() && !entry.disallow_rules.iter().any(|r| r == value) {
                        entry.disallow_rules.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    in_agent_lines = false;
                    if group_applies {
                        if let Ok(delay) = value.parse::<f64>() {
                            entry.crawl_delay = Some(delay.max(0.0));
                        }
                    }
                }
                // Sitemaps are global, not part of any group.
                "sitemap" => {
                    if !value.is_empty() {
                        entry.sitemaps.push(value.to_string());
                    }
                }
                _ => in_agent_lines = false,
            }
        }
        entry
    }

    /// True unless `path` starts with a disallow rule.
    pub fn is_allowed(&self, path: &str) -> bool {
        !self.disallow_rules.iter().any(|rule| path.starts_with(rule.as_str()))
    }

    /// True once the ttl has elapsed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

fn agent_matches(value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    value == "*" || value.contains(ROBOTS_AGENT)
}

// ============================================================================
// Cache
// ============================================================================

/// Robots.txt cache keyed by domain.
pub struct DomainPolitenessCache {
    source: Arc<dyn PageSource>,
    entries: RwLock<HashMap<String, RobotsEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl std::fmt::Debug for DomainPolitenessCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainPolitenessCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl DomainPolitenessCache {
    /// Creates a cache fetching through `source`.
    pub fn new(source: Arc<dyn PageSource>, capacity: usize, ttl: Duration) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Creates a cache sized from the configuration.
    pub fn from_config(source: Arc<dyn PageSource>, config: &EngineConfig) -> Self {
        Self::new(
            source,
            config.robots_capacity,
            Duration::from_secs(config.robots_ttl_secs),
        )
    }

    /// Returns the entry for the URL's domain, fetching it if missing or expired.
    ///
    /// Concurrent misses for the same domain may each fetch; the last one
    /// stored wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no host.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_domain_info(&self, url: &str) -> Result<RobotsEntry, FetchError> {
        let (domain, robots_url) = robots_location(url)?;

        if let Some(entry) = self.entries.read().await.get(&domain) {
            if !entry.is_expired() {
                debug!(domain = %domain, "Robots cache hit");
                return Ok(entry.clone());
            }
        }

        let entry = self.fetch_entry(&domain, &robots_url).await;
        self.store(entry.clone()).await;
        Ok(entry)
    }

    /// True if robots.txt allows fetching `url`. Unusable URLs are allowed.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        match self.get_domain_info(url).await {
            Ok(entry) => entry.is_allowed(&path_and_query(&parsed)),
            Err(e) => {
                debug!(error = %e, "No robots decision, allowing");
                true
            }
        }
    }

    /// Number of cached domains.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn fetch_entry(&self, domain: &str, robots_url: &str) -> RobotsEntry {
        let response = self.source.fetch_page(robots_url, Mode::Standard).await;
        match response.get_text() {
            Some(text) if response.is_status_ok() => {
                let entry = RobotsEntry::parse(domain, &text, self.ttl);
                info!(
                    domain = %domain,
                    rules = entry.disallow_rules.len(),
                    "Fetched robots.txt"
                );
                entry
            }
            _ => {
                debug!(domain = %domain, status = response.status_code, "No usable robots.txt, allowing all");
                RobotsEntry::allow_all(domain, self.ttl)
            }
        }
    }

    async fn store(&self, entry: RobotsEntry) {
        let mut entries = self.entries.write().await;
        entries.insert(entry.domain.clone(), entry);

        while entries.len() > self.capacity {
            let oldest = entries
                .values()
                .min_by_key(|e| e.fetched_at)
                .map(|e| e.domain.clone());
            match oldest {
                Some(domain) => {
                    debug!(domain = %domain, "Evicting robots entry");
                    entries.remove(&domain);
                }
                None => break,
            }
        }
    }
}

/// Returns the cache key and robots.txt URL for a page URL.
fn robots_location(url: &str) -> Result<(String, String), FetchError> {
    let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| HttpError::InvalidUrl(format!("no host in {url}")))?;

    let domain = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let robots_url = format!("{}://{domain}/robots.txt", parsed.scheme());
    Ok((domain, robots_url))
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
