//! Metric locator
//!
//! Finds one engagement count on a rendered item. Counts have no single
//! reliable marker across renderer variants and locales, so the locator runs
//! an ordered chain of independent [`Strategy`] values and returns the first
//! one that produces a value.
//!
//! ## Chain
//!
//! Views are handled on their own: the view count is taken to be the largest
//! metric-looking number anywhere on the item ([`Strategy::LargestNumber`]).
//!
//! Every other kind runs the scoped chain:
//!
//! 1. [`Strategy::StructuralId`]: the kind's action control, by test id
//! 2. [`Strategy::StyleClass`]: a count span carrying the renderer's style classes
//! 3. [`Strategy::AccessibleLabel`]: the first accessible label holding a number
//! 4. [`Strategy::KeywordHint`]: a label naming the kind in one of several languages
//! 5. [`Strategy::FirstToken`]: the first metric-looking number
//!
//! The chain runs first inside the metrics-action container (the common
//! ancestor of the reply/repost/like controls) when one is found, then over the
//! whole item. Narrowing keeps timestamps and numbers inside quoted content
//! out of the result.
//!
//! A count that cannot be found reads as `0`, the same as an observed zero.

use super::node::LabeledNode;
use super::number::{looks_like_metric, parse_compact_number};
use crate::types::MetricKind;

/// Class-name fragments the renderer puts on styled text spans.
pub const STYLE_CLASS_FRAGMENTS: [&str; 2] = ["css-", "r-"];

/// Test ids of the controls whose grandparent is the metrics-action container.
const ACTION_CONTROL_IDS: [&str; 5] = ["reply", "retweet", "unretweet", "like", "unlike"];

/// One independent way of locating a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    LargestNumber,
    StructuralId,
    StyleClass,
    AccessibleLabel,
    KeywordHint,
    FirstToken,
}

/// Strategies run per scope for non-view kinds, in order.
pub const SCOPED_CHAIN: [Strategy; 5] = [
    Strategy::StructuralId,
    Strategy::StyleClass,
    Strategy::AccessibleLabel,
    Strategy::KeywordHint,
    Strategy::FirstToken,
];

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LargestNumber => "largest_number",
            Strategy::StructuralId => "structural_id",
            Strategy::StyleClass => "style_class",
            Strategy::AccessibleLabel => "accessible_label",
            Strategy::KeywordHint => "keyword_hint",
            Strategy::FirstToken => "first_token",
        }
    }

    /// Run this strategy alone over `scope`.
    pub fn try_locate<N: LabeledNode>(&self, scope: &N, kind: MetricKind) -> Option<u64> {
        match self {
            Strategy::LargestNumber => largest_number(scope),
            Strategy::StructuralId => structural_id(scope, kind),
            Strategy::StyleClass => style_class(scope),
            Strategy::AccessibleLabel => accessible_label(scope),
            Strategy::KeywordHint => keyword_hint(scope, kind),
            Strategy::FirstToken => first_token(scope),
        }
    }
}

/// Locate the count of `kind` on `item`; `0` when nothing is found.
pub fn locate<N: LabeledNode>(item: &N, kind: MetricKind) -> u64 {
    if kind.is_view() {
        return attempt(Strategy::LargestNumber, item, kind).unwrap_or(0);
    }

    let mut scopes = Vec::with_capacity(2);
    if let Some(container) = metrics_container(item) {
        scopes.push(container);
    }
    scopes.push(item.clone());

    for scope in &scopes {
        for strategy in SCOPED_CHAIN {
            if let Some(value) = attempt(strategy, scope, kind) {
                return value;
            }
        }
    }

    tracing::trace!(kind = %kind, "no count located");
    0
}

/// The common ancestor of the reply/repost/like controls, if rendered.
pub fn metrics_container<N: LabeledNode>(item: &N) -> Option<N> {
    item.descendant_elements()
        .into_iter()
        .find(|n| {
            n.test_id()
                .is_some_and(|id| ACTION_CONTROL_IDS.contains(&id))
        })?
        .parent_element()?
        .parent_element()
}

fn attempt<N: LabeledNode>(strategy: Strategy, scope: &N, kind: MetricKind) -> Option<u64> {
    tracing::trace!(kind = %kind, strategy = strategy.as_str(), "locator strategy attempted");
    let found = strategy.try_locate(scope, kind);
    if let Some(value) = found {
        tracing::trace!(
            kind = %kind,
            strategy = strategy.as_str(),
            value,
            "locator strategy succeeded"
        );
    }
    found
}

// ============================================
// Per-kind vocabulary
// ============================================

/// Test ids of the action control for each kind.
fn control_ids(kind: MetricKind) -> &'static [&'static str] {
    match kind {
        MetricKind::Like => &["like", "unlike"],
        MetricKind::Retweet => &["retweet", "unretweet", "repost", "unrepost"],
        MetricKind::Reply => &["reply"],
        MetricKind::Bookmark => &["bookmark", "removeBookmark"],
        MetricKind::View => &[],
    }
}

/// Lowercase keywords that name each kind in an accessible label.
fn label_keywords(kind: MetricKind) -> &'static [&'static str] {
    match kind {
        MetricKind::Like => &["いいね", "like", "me gusta", "j’aime", "j'aime", "喜欢"],
        MetricKind::Retweet => &["リポスト", "repost", "retweet", "retuit", "转帖"],
        MetricKind::Reply => &["返信", "repl", "respuesta", "réponse", "回复"],
        MetricKind::Bookmark => &["ブックマーク", "bookmark", "guardad", "signet", "书签"],
        MetricKind::View => &[],
    }
}

// ============================================
// Strategies
// ============================================

/// Spans whose trimmed text looks like a bare count, with parsed values.
fn numeric_spans<N: LabeledNode>(scope: &N) -> impl Iterator<Item = (N, u64)> {
    scope.find_all_by_tag("span").into_iter().filter_map(|span| {
        let text = span.text_content();
        let text = text.trim();
        if looks_like_metric(text) {
            let value = parse_compact_number(text);
            Some((span, value))
        } else {
            None
        }
    })
}

fn largest_number<N: LabeledNode>(scope: &N) -> Option<u64> {
    numeric_spans(scope).map(|(_, v)| v).max()
}

/// The kind's control decides the count when present; an unlabeled control
/// with no number means a zero count the renderer chose not to print.
fn structural_id<N: LabeledNode>(scope: &N, kind: MetricKind) -> Option<u64> {
    let control = control_ids(kind)
        .iter()
        .find_map(|id| scope.find_by_test_id(id))?;

    Some(
        style_class(&control)
            .or_else(|| accessible_label(&control))
            .or_else(|| first_token(&control))
            .unwrap_or(0),
    )
}

fn style_class<N: LabeledNode>(scope: &N) -> Option<u64> {
    numeric_spans(scope)
        .find(|(span, _)| span.has_class_fragments(&STYLE_CLASS_FRAGMENTS))
        .map(|(_, v)| v)
}

fn accessible_label<N: LabeledNode>(scope: &N) -> Option<u64> {
    scope.labeled_elements().into_iter().find_map(|n| {
        let label = n.accessible_label()?;
        label
            .chars()
            .any(|c| c.is_ascii_digit())
            .then(|| parse_compact_number(label))
    })
}

fn keyword_hint<N: LabeledNode>(scope: &N, kind: MetricKind) -> Option<u64> {
    let keywords = label_keywords(kind);
    scope.labeled_elements().into_iter().find_map(|n| {
        let label = n.accessible_label()?;
        let lowered = label.to_lowercase();
        keywords
            .iter()
            .any(|k| lowered.contains(k))
            .then(|| parse_compact_number(label))
    })
}

fn first_token<N: LabeledNode>(scope: &N) -> Option<u64> {
    numeric_spans(scope).next().map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{ElementRef, Html, Selector};

    fn with_article<F: FnOnce(ElementRef<'_>)>(html: &str, f: F) {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("article").unwrap();
        f(doc.select(&sel).next().unwrap());
    }

    const FULL_ITEM: &str = r#"
<article data-testid="tweet">
  <a href="/alice/status/1"><time datetime="2024-05-01T10:00:00.000Z">May 1</time></a>
  <div data-testid="tweetText"><span>Shipped 3 features</span></div>
  <div role="group" aria-label="12 replies, 34 reposts, 1,200 likes, 5 bookmarks, 45.6K views">
    <div>
      <button data-testid="reply" aria-label="12 Replies. Reply"><span class="css-1jxf684 r-bcqeeo">12</span></button>
    </div>
    <div>
      <button data-testid="retweet" aria-label="34 reposts. Repost"><span class="css-1jxf684 r-bcqeeo">34</span></button>
    </div>
    <div>
      <button data-testid="like" aria-label="1200 Likes. Like"><span class="css-1jxf684 r-bcqeeo">1.2K</span></button>
    </div>
    <div>
      <a href="/alice/status/1/analytics" aria-label="45600 views. View post analytics"><span class="css-1jxf684 r-bcqeeo">45.6K</span></a>
    </div>
    <div>
      <button data-testid="bookmark" aria-label="Bookmark"></button>
    </div>
  </div>
</article>"#;

    #[test]
    fn test_locate_full_item() {
        with_article(FULL_ITEM, |a| {
            assert_eq!(locate(&a, MetricKind::Reply), 12);
            assert_eq!(locate(&a, MetricKind::Retweet), 34);
            assert_eq!(locate(&a, MetricKind::Like), 1200);
            assert_eq!(locate(&a, MetricKind::View), 45_600);
            assert_eq!(locate(&a, MetricKind::Bookmark), 0);
        });
    }

    #[test]
    fn test_view_takes_largest_number() {
        with_article(
            r#"<article><span>3</span><span>1.5万</span><span>20</span></article>"#,
            |a| {
                assert_eq!(locate(&a, MetricKind::View), 15_000);
            },
        );
    }

    #[test]
    fn test_view_without_numbers_is_zero() {
        with_article(r#"<article><span>hello</span></article>"#, |a| {
            assert_eq!(locate(&a, MetricKind::View), 0);
        });
    }

    #[test]
    fn test_structural_id_reads_control_only() {
        with_article(
            r#"<article><span class="css-a r-b">99</span><div data-testid="unlike"><span>7</span></div></article>"#,
            |a| {
                assert_eq!(
                    Strategy::StructuralId.try_locate(&a, MetricKind::Like),
                    Some(7)
                );
                assert_eq!(
                    Strategy::StructuralId.try_locate(&a, MetricKind::Reply),
                    None
                );
            },
        );
    }

    #[test]
    fn test_structural_id_control_without_count_is_zero() {
        with_article(
            r#"<article><div data-testid="retweet"><svg></svg></div><span>55</span></article>"#,
            |a| {
                assert_eq!(locate(&a, MetricKind::Retweet), 0);
            },
        );
    }

    #[test]
    fn test_style_class_requires_both_fragments() {
        with_article(
            r#"<article><span class="css-a">1</span><span class="r-b">2</span><span class="css-a r-b">3</span></article>"#,
            |a| {
                assert_eq!(
                    Strategy::StyleClass.try_locate(&a, MetricKind::Like),
                    Some(3)
                );
            },
        );
    }

    #[test]
    fn test_accessible_label_needs_a_number() {
        with_article(
            r#"<article><div aria-label="Like"></div><div aria-label="8 Likes"></div></article>"#,
            |a| {
                assert_eq!(
                    Strategy::AccessibleLabel.try_locate(&a, MetricKind::Like),
                    Some(8)
                );
            },
        );
        with_article(r#"<article aria-label="Bookmark"></article>"#, |a| {
            assert_eq!(
                Strategy::AccessibleLabel.try_locate(&a, MetricKind::Bookmark),
                None
            );
        });
    }

    #[test]
    fn test_keyword_hint_localized() {
        with_article(
            r#"<article><div aria-label="返信 4件"></div><div aria-label="12,000 件のいいね"></div></article>"#,
            |a| {
                assert_eq!(
                    Strategy::KeywordHint.try_locate(&a, MetricKind::Like),
                    Some(12_000)
                );
                assert_eq!(
                    Strategy::KeywordHint.try_locate(&a, MetricKind::Reply),
                    Some(4)
                );
                assert_eq!(
                    Strategy::KeywordHint.try_locate(&a, MetricKind::Bookmark),
                    None
                );
            },
        );
    }

    #[test]
    fn test_first_token_fallback() {
        with_article(
            r#"<article><span>@bob</span><span>17</span><span>4</span></article>"#,
            |a| {
                assert_eq!(locate(&a, MetricKind::Reply), 17);
            },
        );
    }

    #[test]
    fn test_container_scope_skips_quoted_numbers() {
        let html = r#"
<article>
  <div class="quoted"><span class="css-q r-q">2023</span></div>
  <div id="bar">
    <div><div data-testid="reply"></div></div>
    <div><div data-testid="like"></div></div>
    <div><span class="css-x r-x">9</span></div>
  </div>
</article>"#;
        with_article(html, |a| {
            let container = metrics_container(&a).unwrap();
            assert_eq!(container.attr("id"), Some("bar"));
            // No bookmark control: the container's styled count wins over the quoted year.
            assert_eq!(locate(&a, MetricKind::Bookmark), 9);
        });
    }

    #[test]
    fn test_nothing_found_is_zero() {
        with_article(r#"<article><p>just words</p></article>"#, |a| {
            for kind in MetricKind::ALL {
                assert_eq!(locate(&a, kind), 0);
            }
        });
    }
}
