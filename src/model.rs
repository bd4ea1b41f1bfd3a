//! Data model for the fetched thread document
//!
//! The document is produced by an external scraper and comes in two slightly
//! different shapes: the comment list may live under `Comments` or `comments`,
//! and reply trees under `repliesParsed` or `replies`. Both are accepted.

use serde::Deserialize;

/// A full snapshot of the comment thread, as returned by one fetch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadDocument {
    #[serde(default)]
    pub title: Option<String>,
    /// Link to the original thread, typically on the OAuth API host.
    #[serde(default)]
    pub gamethread: Option<String>,
    #[serde(default, alias = "Comments")]
    pub comments: Vec<Comment>,
}

impl ThreadDocument {
    /// Thread title with the leading "[Game Thread]" tag stripped.
    pub fn display_title(&self) -> Option<String> {
        let title = self.title.as_deref()?.trim();
        if title.is_empty() {
            return None;
        }
        Some(strip_thread_tag(title).to_string())
    }

    /// Public URL of the source thread (OAuth host rewritten to www).
    pub fn thread_link(&self) -> Option<String> {
        self.gamethread
            .as_ref()
            .map(|url| url.replacen("oauth.reddit.com", "www.reddit.com", 1))
    }
}

/// A node in the source comment tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comment {
    /// Stable identity. May be empty; such comments are never treated as new.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Pre-rendered body markup, trusted as-is.
    #[serde(default)]
    pub body: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub created: Option<i64>,
    /// Raw parent reference, possibly carrying a `t1_`-style type tag.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// CRLF-delimited list of flair image URLs.
    #[serde(default, rename = "FlairURLs")]
    pub flair_urls: Option<String>,
    #[serde(default, rename = "FlairText")]
    pub flair_text: Option<String>,
    #[serde(default, alias = "repliesParsed")]
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Parent id with any `t<n>_` type tag stripped, for display lookups.
    pub fn parent_key(&self) -> Option<&str> {
        let raw = self.parent_id.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(strip_type_tag(raw))
    }

    /// Flair image URLs, split and cleaned of empty segments.
    pub fn flair_images(&self) -> Vec<&str> {
        self.flair_urls
            .as_deref()
            .map(|raw| {
                raw.lines()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flair text, if present and non-blank.
    pub fn flair_label(&self) -> Option<&str> {
        self.flair_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Strip a `t<digit>_` type-tag prefix from a fullname-style reference.
fn strip_type_tag(reference: &str) -> &str {
    let bytes = reference.as_bytes();
    if bytes.len() > 3 && bytes[0] == b't' && bytes[1].is_ascii_digit() && bytes[2] == b'_' {
        &reference[3..]
    } else {
        reference
    }
}

/// Strip a leading "[Game Thread]" tag, case-insensitively.
fn strip_thread_tag(title: &str) -> &str {
    let rest = title.strip_prefix('[').map(|rest| rest.split_once(']'));
    if let Some(Some((tag, tail))) = rest {
        if tag.trim().eq_ignore_ascii_case("game thread") {
            return tail.trim_start();
        }
    }
    title
}
