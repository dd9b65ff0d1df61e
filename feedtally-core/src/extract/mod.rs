//! Extraction engine
//!
//! One extraction pass selects every feed item in a document snapshot, parses
//! each into a [`PostRecord`], and offers the records to the shared store.
//!
//! - [`number`]: compact number parsing
//! - [`node`]: the read-only tree interface the parsers run against
//! - [`locator`]: metric location by strategy chain
//! - [`record`]: item to record

pub mod locator;
pub mod node;
pub mod number;
pub mod record;

use std::sync::LazyLock;

use scraper::{Html, Selector};

pub use locator::{locate, Strategy};
pub use node::LabeledNode;
pub use number::parse_compact_number;
pub use record::{RecordParser, SkipReason};

use crate::store::{MergeOutcome, SharedStore};
use crate::types::PostRecord;

/// Selector matching one rendered feed item.
pub const ITEM_SELECTOR: &str = r#"article[data-testid="tweet"], article[role="article"]"#;

static ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(ITEM_SELECTOR).expect("valid selector"));

/// Counts from one extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Items matched by the selector
    pub seen: usize,
    /// Items that produced a record
    pub parsed: usize,
    pub added: usize,
    pub updated: usize,
    /// Records dropped by the owner filter
    pub rejected: usize,
}

/// Parse every feed item in `html`.
///
/// Items that are not posts are skipped. Duplicates (an item rendered twice)
/// are returned as they appear.
pub fn parse_document(html: &str, parser: &RecordParser) -> Vec<PostRecord> {
    let document = Html::parse_document(html);
    document
        .select(&ITEMS)
        .filter_map(|item| parser.parse(&item))
        .collect()
}

/// Run one extraction pass over `html` into `store`.
pub fn collect_visible(html: &str, parser: &RecordParser, store: &SharedStore) -> PassStats {
    let document = Html::parse_document(html);
    let mut stats = PassStats::default();
    let mut records = Vec::new();

    for item in document.select(&ITEMS) {
        stats.seen += 1;
        if let Some(record) = parser.parse(&item) {
            records.push(record);
        }
    }
    stats.parsed = records.len();

    for record in records {
        // One lock per record; readers may observe the pass part-way through.
        match store.lock().offer(record) {
            MergeOutcome::Inserted => stats.added += 1,
            MergeOutcome::Updated => stats.updated += 1,
            MergeOutcome::Rejected => stats.rejected += 1,
        }
    }

    tracing::debug!(
        seen = stats.seen,
        parsed = stats.parsed,
        added = stats.added,
        updated = stats.updated,
        rejected = stats.rejected,
        "extraction pass complete"
    );
    stats
}
