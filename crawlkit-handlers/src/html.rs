//! Metadata extraction from HTML pages and RSS/Atom feeds.
//!
//! Regex based and forgiving: a page that does not parse yields empty
//! properties, never an error.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

// ============================================================================
// Page Properties
// ============================================================================

/// Metadata derived from a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageProperties {
    /// Canonical link of the page.
    pub link: Option<String>,
    /// Page or feed title.
    pub title: Option<String>,
    /// Short description.
    pub description: Option<String>,
    /// Content language (e.g. `en`, `pl-PL`).
    pub language: Option<String>,
    /// Thumbnail image URL.
    pub thumbnail: Option<String>,
    /// Feed URL, when the page has or is one.
    pub feed_url: Option<String>,
}

impl PageProperties {
    /// Fills empty fields from `other`.
    pub fn merge_missing(&mut self, other: PageProperties) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.link, other.link);
        fill(&mut self.title, other.title);
        fill(&mut self.description, other.description);
        fill(&mut self.language, other.language);
        fill(&mut self.thumbnail, other.thumbnail);
        fill(&mut self.feed_url, other.feed_url);
    }
}

// ============================================================================
// Regex Patterns
// ============================================================================

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("Invalid regex"));

static META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("Invalid regex"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\s[^>]*>").expect("Invalid regex"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("Invalid regex")
});

static HTML_LANG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<html\b[^>]*?\slang\s*=\s*["']?([A-Za-z]{2,3}(?:[-_][A-Za-z0-9]+)*)"#)
        .expect("Invalid regex")
});

static FEED_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Everything before the first item/entry is channel-level metadata.
    Regex::new(r"(?is)^(.*?)(?:<item[\s>]|<entry[\s>]|$)").expect("Invalid regex")
});

static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("Invalid regex"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("Invalid regex"));

// ============================================================================
// HTML
// ============================================================================

/// Extracts title, description, language, thumbnail, link and feed link.
///
/// `og:*` meta tags win over their plain counterparts.
pub fn page_properties(html: &str) -> PageProperties {
    let meta = meta_tags(html);
    let meta_value = |keys: &[&str]| keys.iter().find_map(|k| meta.get(*k).cloned());

    PageProperties {
        link: meta_value(&["og:url"]).or_else(|| link_href(html, "canonical", None)),
        title: meta_value(&["og:title", "twitter:title"]).or_else(|| first_text(&TITLE_RE, html)),
        description: meta_value(&["og:description", "description", "twitter:description"]),
        language: HTML_LANG_RE
            .captures(html)
            .map(|c| c[1].to_string())
            .or_else(|| meta_value(&["og:locale"])),
        thumbnail: meta_value(&["og:image", "twitter:image"]),
        feed_url: link_href(html, "alternate", Some("rss"))
            .or_else(|| link_href(html, "alternate", Some("atom"))),
    }
}

/// `name`/`property` → `content` for every meta tag, keys lowercased.
fn meta_tags(html: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for tag in META_RE.find_iter(html) {
        let attrs = attributes(tag.as_str());
        let key = attrs.get("property").or_else(|| attrs.get("name"));
        if let (Some(key), Some(content)) = (key, attrs.get("content")) {
            let content = clean(content);
            if !content.is_empty() {
                tags.entry(key.to_ascii_lowercase()).or_insert(content);
            }
        }
    }
    tags
}

/// `href` of the first `<link>` with the given `rel` whose `type` contains `kind`.
fn link_href(html: &str, rel: &str, kind: Option<&str>) -> Option<String> {
    LINK_RE.find_iter(html).find_map(|tag| {
        let attrs = attributes(tag.as_str());
        let rel_matches = attrs
            .get("rel")
            .is_some_and(|r| r.split_whitespace().any(|r| r.eq_ignore_ascii_case(rel)));
        let kind_matches = kind.is_none_or(|kind| {
            attrs
                .get("type")
                .is_some_and(|t| t.to_ascii_lowercase().contains(kind))
        });
        if rel_matches && kind_matches {
            attrs.get("href").map(|h| clean(h)).filter(|h| !h.is_empty())
        } else {
            None
        }
    })
}

fn attributes(tag: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag)
        .map(|c| {
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map_or("", |m| m.as_str());
            (c[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

// ============================================================================
// Feeds
// ============================================================================

/// Extracts channel-level title, description, language and link from RSS or Atom.
pub fn feed_properties(xml: &str) -> PageProperties {
    let head = FEED_HEAD_RE
        .captures(xml)
        .and_then(|c| c.get(1))
        .map_or(xml, |m| m.as_str());

    PageProperties {
        link: element_text(head, "link").or_else(|| link_href(head, "alternate", None)),
        title: element_text(head, "title"),
        description: element_text(head, "description").or_else(|| element_text(head, "subtitle")),
        language: element_text(head, "language"),
        thumbnail: element_text(head, "url")
            .or_else(|| element_text(head, "icon"))
            .or_else(|| element_text(head, "logo")),
        feed_url: None,
    }
}

/// Title of an RSS or Atom feed.
pub fn feed_title(xml: &str) -> Option<String> {
    feed_properties(xml).title
}

fn element_text(xml: &str, name: &str) -> Option<String> {
    let pattern = format!(r"(?is)<{name}(?:\s[^>]*)?>(.*?)</{name}>");
    let regex = Regex::new(&pattern).ok()?;
    first_text(&regex, xml)
}

fn first_text(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .map(|c| clean(&c[1]))
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Text Cleanup
// ============================================================================

/// Unwraps CDATA, drops tags, decodes common entities and collapses whitespace.
fn clean(raw: &str) -> String {
    let text = CDATA_RE.replace_all(raw, "$1");
    let text = TAG_RE.replace_all(&text, " ");
    let text = decode_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="pl-PL">
<head>
  <title>  Plain &amp; Simple </title>
  <meta name="description" content="Plain description">
  <meta property="og:title" content="OG Title">
  <meta property="og:image" content='https://img.example/a.png'>
  <link rel="canonical" href="https://example.org/page">
  <link rel="alternate" type="application/rss+xml" title="Feed" href="/feed.xml">
</head>
<body><p>hello</p></body>
</html>"#;

    #[test]
    fn test_page_properties() {
        let props = page_properties(PAGE);
        assert_eq!(props.title.as_deref(), Some("OG Title"));
        assert_eq!(props.description.as_deref(), Some("Plain description"));
        assert_eq!(props.language.as_deref(), Some("pl-PL"));
        assert_eq!(props.thumbnail.as_deref(), Some("https://img.example/a.png"));
        assert_eq!(props.link.as_deref(), Some("https://example.org/page"));
        assert_eq!(props.feed_url.as_deref(), Some("/feed.xml"));
    }

    #[test]
    fn test_title_fallback_decodes_entities() {
        let props = page_properties("<html><head><title>A &amp; B</title></head></html>");
        assert_eq!(props.title.as_deref(), Some("A & B"));
        assert_eq!(props.language, None);
        assert_eq!(props.feed_url, None);
    }

    #[test]
    fn test_rss_properties_ignore_items() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title><![CDATA[Channel Title]]></title>
  <link>https://example.org/</link>
  <description>About things</description>
  <language>en-us</language>
  <item><title>First post</title><link>https://example.org/1</link></item>
</channel></rss>"#;
        let props = feed_properties(xml);
        assert_eq!(props.title.as_deref(), Some("Channel Title"));
        assert_eq!(props.link.as_deref(), Some("https://example.org/"));
        assert_eq!(props.description.as_deref(), Some("About things"));
        assert_eq!(props.language.as_deref(), Some("en-us"));
    }

    #[test]
    fn test_atom_feed_title_and_link() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Channel</title>
  <link rel="alternate" href="https://www.youtube.com/channel/UCx"/>
  <entry><title>Video</title></entry>
</feed>"#;
        assert_eq!(feed_title(xml).as_deref(), Some("Atom Channel"));
        assert_eq!(
            feed_properties(xml).link.as_deref(),
            Some("https://www.youtube.com/channel/UCx")
        );
    }

    #[test]
    fn test_garbage_yields_nothing() {
        assert_eq!(page_properties("%%% not html"), PageProperties::default());
        assert_eq!(feed_title(""), None);
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut props = PageProperties {
            title: Some("kept".into()),
            ..PageProperties::default()
        };
        props.merge_missing(PageProperties {
            title: Some("other".into()),
            language: Some("en".into()),
            ..PageProperties::default()
        });
        assert_eq!(props.title.as_deref(), Some("kept"));
        assert_eq!(props.language.as_deref(), Some("en"));
    }
}
