//! Core domain types for feedtally
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Post** | One rendered feed item that carries a permalink |
//! | **Permalink** | The canonical link of a post; its path yields the post id and author |
//! | **Metric** | An engagement count shown on a post (likes, reposts, replies, views, bookmarks) |
//! | **Owner** | The profile whose feed is being collected |
//!
//! A count of `0` is an observed value. A metric the locator could not find
//! is also reported as `0`; the two are indistinguishable by design of the
//! rendered markup, which hides zero counts.

use serde::{Deserialize, Serialize};

// ============================================
// Metrics
// ============================================

/// Which engagement count to locate on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Like,
    Retweet,
    Reply,
    View,
    Bookmark,
}

impl MetricKind {
    /// All kinds, in the order the record parser reads them.
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Like,
        MetricKind::Retweet,
        MetricKind::Reply,
        MetricKind::View,
        MetricKind::Bookmark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Like => "like",
            MetricKind::Retweet => "retweet",
            MetricKind::Reply => "reply",
            MetricKind::View => "view",
            MetricKind::Bookmark => "bookmark",
        }
    }

    /// View counts have no structural marker and are located differently.
    pub fn is_view(&self) -> bool {
        matches!(self, MetricKind::View)
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engagement counts of one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub like: u64,
    pub retweet: u64,
    pub reply: u64,
    pub view: u64,
    pub bookmark: u64,
}

impl Metrics {
    pub fn get(&self, kind: MetricKind) -> u64 {
        match kind {
            MetricKind::Like => self.like,
            MetricKind::Retweet => self.retweet,
            MetricKind::Reply => self.reply,
            MetricKind::View => self.view,
            MetricKind::Bookmark => self.bookmark,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: u64) {
        match kind {
            MetricKind::Like => self.like = value,
            MetricKind::Retweet => self.retweet = value,
            MetricKind::Reply => self.reply = value,
            MetricKind::View => self.view = value,
            MetricKind::Bookmark => self.bookmark = value,
        }
    }
}

// ============================================
// Post
// ============================================

/// How a post appears in the feed, derived from its context label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    #[default]
    Original,
    Repost,
    Pinned,
    Reply,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Original => "original",
            PostType::Repost => "repost",
            PostType::Pinned => "pinned",
            PostType::Reply => "reply",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(PostType::Original),
            "repost" => Ok(PostType::Repost),
            "pinned" => Ok(PostType::Pinned),
            "reply" => Ok(PostType::Reply),
            _ => Err(format!("unknown post type: {}", s)),
        }
    }
}

/// One post extracted from the rendered feed.
///
/// `id` is the primary key. A post seen again on a later pass is merged into
/// the stored record, never duplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Post identifier taken from the permalink
    pub id: String,
    /// Absolute permalink
    pub url: String,
    /// Author handle taken from the permalink (no leading `@`)
    pub author_handle: String,
    /// ISO-8601 timestamp from the item's time element; empty when absent
    pub created_at: String,
    /// Body text with horizontal whitespace collapsed; newlines kept
    pub text: String,
    pub metrics: Metrics,
    pub has_photo: bool,
    pub has_video: bool,
    pub post_type: PostType,
}

impl PostRecord {
    /// Overwrite every field with a later read of the same post.
    ///
    /// The id is left untouched. All fields of a parsed record are present,
    /// so a later read wins field by field, zero counts included.
    pub fn merge_from(&mut self, newer: PostRecord) {
        debug_assert_eq!(self.id, newer.id);
        let PostRecord {
            id: _,
            url,
            author_handle,
            created_at,
            text,
            metrics,
            has_photo,
            has_video,
            post_type,
        } = newer;
        self.url = url;
        self.author_handle = author_handle;
        self.created_at = created_at;
        self.text = text;
        self.metrics = metrics;
        self.has_photo = has_photo;
        self.has_video = has_video;
        self.post_type = post_type;
    }
}
