//! Record parser
//!
//! Turns one rendered feed item into a [`PostRecord`]. Items without a
//! permalink (ads, "who to follow" cards, separators) are not posts and are
//! skipped; everything else about a post is best effort, with absent fields
//! read as empty strings, `false`, or `0`.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::locator;
use super::node::LabeledNode;
use crate::types::{MetricKind, Metrics, PostRecord, PostType};

/// Origin used to absolutize relative permalinks.
pub const DEFAULT_BASE_URL: &str = "https://x.com";

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\t\u{00A0}]+").expect("valid regex"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("valid regex"));

/// Context-label keywords, checked in order; the first group that matches wins.
const CONTEXT_KEYWORDS: [(PostType, &[&str]); 3] = [
    (
        PostType::Repost,
        &["retweeted", "reposted", "リポスト", "转帖", "repostó"],
    ),
    (PostType::Pinned, &["pinned", "固定表示", "置顶", "fijado"]),
    (
        PostType::Reply,
        &["replying to", "返信先", "replied", "回复", "respondiendo a"],
    ),
];

/// Why an item did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No link to a post permalink inside the item
    NoPermalink,
    /// A permalink-shaped link whose path has no author or id segment
    MalformedPermalink(String),
}

/// Identity decoded from a permalink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink {
    pub id: String,
    pub author: String,
    /// Absolute link cut after the id segment, without query or fragment
    pub canonical_url: String,
}

/// Parses rendered items into post records.
#[derive(Debug, Clone)]
pub struct RecordParser {
    base_url: String,
}

impl RecordParser {
    /// Create a parser resolving relative permalinks against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Parse one item; `None` when the item is not a post.
    pub fn parse<N: LabeledNode>(&self, item: &N) -> Option<PostRecord> {
        match self.try_parse(item) {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::trace!(?reason, "item skipped");
                None
            }
        }
    }

    /// Parse one item, reporting why it was skipped.
    pub fn try_parse<N: LabeledNode>(&self, item: &N) -> Result<PostRecord, SkipReason> {
        let href = item
            .find_all_by_tag("a")
            .into_iter()
            .find_map(|a| a.attr("href").filter(|h| h.contains("/status/")).map(str::to_string))
            .ok_or(SkipReason::NoPermalink)?;

        let permalink = self
            .resolve(&href)
            .as_ref()
            .and_then(decode_permalink)
            .ok_or_else(|| SkipReason::MalformedPermalink(href.clone()))?;

        let text = item
            .find_all_by_test_id("tweetText")
            .iter()
            .map(|n| n.text_content())
            .collect::<Vec<_>>()
            .join("\n");

        let created_at = item
            .find_all_by_tag("time")
            .first()
            .and_then(|t| t.attr("datetime"))
            .unwrap_or_default()
            .to_string();

        let mut metrics = Metrics::default();
        for kind in MetricKind::ALL {
            metrics.set(kind, locator::locate(item, kind));
        }

        Ok(PostRecord {
            id: permalink.id,
            url: permalink.canonical_url,
            author_handle: permalink.author,
            created_at,
            text: normalize_whitespace(&text),
            metrics,
            has_photo: has_photo(item),
            has_video: has_video(item),
            post_type: detect_post_type(item),
        })
    }

    fn resolve(&self, href: &str) -> Option<Url> {
        if href.starts_with("http") {
            Url::parse(href).ok()
        } else {
            Url::parse(&self.base_url).ok()?.join(href).ok()
        }
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Decode author and id from `/{author}/status/{id}[/...]`.
pub fn decode_permalink(url: &Url) -> Option<Permalink> {
    let parts: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let idx = parts.iter().position(|s| *s == "status")?;
    if idx < 1 || idx + 1 >= parts.len() {
        return None;
    }

    Some(Permalink {
        id: parts[idx + 1].to_string(),
        author: parts[idx - 1].to_string(),
        canonical_url: format!(
            "{}/{}",
            url.origin().ascii_serialization(),
            parts[..=idx + 1].join("/")
        ),
    })
}

/// Collapse tabs, non-breaking spaces, and space runs to one space; trim.
///
/// Newlines are kept.
pub fn normalize_whitespace(s: &str) -> String {
    let s = HORIZONTAL_WS.replace_all(s, " ");
    SPACE_RUN.replace_all(&s, " ").trim().to_string()
}

/// Classify the item's context label ("Pinned", "Alice reposted", ...).
pub fn detect_post_type<N: LabeledNode>(item: &N) -> PostType {
    let context = item
        .find_by_test_id("socialContext")
        .map(|n| n.text_content().to_lowercase())
        .unwrap_or_default();
    classify_context(&context)
}

/// Match lowercase context text against the ordered keyword groups.
pub fn classify_context(context: &str) -> PostType {
    CONTEXT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| context.contains(k)))
        .map(|(post_type, _)| *post_type)
        .unwrap_or_default()
}

fn has_photo<N: LabeledNode>(item: &N) -> bool {
    item.find_all_by_tag("img")
        .iter()
        .any(|img| img.attr("src").is_some_and(|src| src.contains("twimg.com/media")))
        || item
            .find_all_by_test_id("tweetPhoto")
            .iter()
            .any(|photo| !photo.find_all_by_tag("img").is_empty())
}

fn has_video<N: LabeledNode>(item: &N) -> bool {
    !item.find_all_by_tag("video").is_empty() || item.find_by_test_id("videoPlayer").is_some()
}
