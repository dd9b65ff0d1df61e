//! Read-only view of a rendered item subtree
//!
//! Extraction only needs a handful of questions answered about the rendered
//! tree: an element's tag and attributes, its text, its parent, and its
//! descendants in document order. [`LabeledNode`] captures exactly that, so
//! the locator and record parser run unchanged against a live snapshot or a
//! synthetic fragment in a test.
//!
//! Identifier, accessible-label, and class-fragment queries are provided
//! methods on top of those primitives.

use scraper::{ElementRef, Node};

/// Attribute carrying the renderer's stable test identifier.
pub const TEST_ID_ATTR: &str = "data-testid";
/// Attribute carrying assistive text.
pub const LABEL_ATTR: &str = "aria-label";

/// An element in a rendered tree.
pub trait LabeledNode: Sized + Clone {
    /// Lowercase tag name.
    fn tag(&self) -> &str;

    /// Attribute value, if present.
    fn attr(&self, name: &str) -> Option<&str>;

    /// Concatenated text of this element and everything below it. Line
    /// breaks (`<br>`) read as `\n`.
    fn text_content(&self) -> String;

    /// Parent element, if any.
    fn parent_element(&self) -> Option<Self>;

    /// All descendant elements in document order, excluding `self`.
    fn descendant_elements(&self) -> Vec<Self>;

    fn test_id(&self) -> Option<&str> {
        self.attr(TEST_ID_ATTR)
    }

    fn accessible_label(&self) -> Option<&str> {
        self.attr(LABEL_ATTR).filter(|l| !l.is_empty())
    }

    /// Whether the `class` attribute contains every fragment as a substring.
    fn has_class_fragments(&self, fragments: &[&str]) -> bool {
        match self.attr("class") {
            Some(class) => fragments.iter().all(|f| class.contains(f)),
            None => false,
        }
    }

    /// First descendant carrying the given test identifier.
    fn find_by_test_id(&self, id: &str) -> Option<Self> {
        self.descendant_elements()
            .into_iter()
            .find(|n| n.test_id() == Some(id))
    }

    /// All descendants carrying the given test identifier.
    fn find_all_by_test_id(&self, id: &str) -> Vec<Self> {
        self.descendant_elements()
            .into_iter()
            .filter(|n| n.test_id() == Some(id))
            .collect()
    }

    /// All descendants with the given tag.
    fn find_all_by_tag(&self, tag: &str) -> Vec<Self> {
        self.descendant_elements()
            .into_iter()
            .filter(|n| n.tag() == tag)
            .collect()
    }

    /// `self` followed by every descendant that has an accessible label.
    fn labeled_elements(&self) -> Vec<Self> {
        std::iter::once(self.clone())
            .chain(self.descendant_elements())
            .filter(|n| n.accessible_label().is_some())
            .collect()
    }
}

impl<'a> LabeledNode for ElementRef<'a> {
    fn tag(&self) -> &str {
        self.value().name()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn text_content(&self) -> String {
        let mut text = String::new();
        for node in self.descendants() {
            match node.value() {
                Node::Text(t) => text.push_str(t),
                Node::Element(el) if el.name() == "br" => text.push('\n'),
                _ => {}
            }
        }
        text
    }

    fn parent_element(&self) -> Option<Self> {
        self.parent().and_then(ElementRef::wrap)
    }

    fn descendant_elements(&self) -> Vec<Self> {
        self.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn with_article<F: FnOnce(ElementRef<'_>)>(html: &str, f: F) {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("article").unwrap();
        f(doc.select(&sel).next().unwrap());
    }

    #[test]
    fn test_queries_on_scraper_tree() {
        with_article(
            r#"<article aria-label="Post"><div data-testid="like" class="css-1 r-2"><span>5</span></div><span>x</span></article>"#,
            |a| {
                assert_eq!(a.tag(), "article");
                assert_eq!(a.accessible_label(), Some("Post"));
                assert_eq!(a.text_content(), "5x");

                let like = a.find_by_test_id("like").unwrap();
                assert!(like.has_class_fragments(&["css-", "r-"]));
                assert!(!like.has_class_fragments(&["css-", "q-"]));
                assert_eq!(like.parent_element().unwrap().tag(), "article");

                assert_eq!(a.find_all_by_tag("span").len(), 2);
                assert_eq!(a.labeled_elements().len(), 1);
                assert!(a.find_by_test_id("retweet").is_none());
            },
        );
    }

    #[test]
    fn test_text_content_line_breaks() {
        with_article(
            r#"<article><span>first line<br>second</span><span> line<br/></span></article>"#,
            |a| assert_eq!(a.text_content(), "first line\nsecond line\n"),
        );
    }

    #[test]
    fn test_empty_label_is_ignored() {
        with_article(r#"<article aria-label=""><b>1</b></article>"#, |a| {
            assert!(a.accessible_label().is_none());
            assert!(a.labeled_elements().is_empty());
        });
    }
}
