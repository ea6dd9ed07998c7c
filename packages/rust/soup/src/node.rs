//! Owned document tree and the bridge from `scraper`'s DOM.

use gatherbox_shared::{GatherError, Result};
use scraper::{ElementRef, Html};
use tracing::debug;

/// Tag given to the synthetic element at the root of a parsed document.
pub const DOCUMENT_TAG: &str = "#document";

/// A node of a parsed document.
///
/// Children are owned by their parent, so a tree is always finite and
/// acyclic. Pre-order traversal defines document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element: tag name, ordered attributes, ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Value of the first attribute named `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Tag name, or `None` for a text leaf.
    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(|el| el.tag.as_str())
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) => &[],
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Node::size).sum::<usize>()
    }

    /// Serialize the subtree back to markup, escaping text and attribute values.
    ///
    /// The synthetic document root contributes only its children.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }
}

fn write_html(node: &Node, out: &mut String) {
    match node {
        Node::Text(value) => escape_into(value, false, out),
        Node::Element(el) if el.tag == DOCUMENT_TAG => {
            for child in &el.children {
                write_html(child, out);
            }
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (key, value) in &el.attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            for child in &el.children {
                write_html(child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn escape_into(value: &str, in_attr: bool, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a full HTML document into an owned [`Node`] tree.
///
/// The returned root is an element tagged [`DOCUMENT_TAG`]. Comments,
/// doctypes and processing instructions are dropped. Blank input is an
/// error, since no extractor can do anything useful with it.
pub fn parse_document(markup: &str) -> Result<Node> {
    if markup.trim().is_empty() {
        return Err(GatherError::parse("empty document"));
    }

    let html = Html::parse_document(markup);
    if !html.errors.is_empty() {
        debug!(errors = html.errors.len(), "html parser recovered from errors");
    }

    let mut root = Element::new(DOCUMENT_TAG);
    root.children.push(Node::Element(convert(html.root_element())));
    Ok(Node::Element(root))
}

fn convert(el: ElementRef<'_>) -> Element {
    let mut element = Element::new(el.value().name());
    element.attrs = el
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for child in el.children() {
        match child.value() {
            scraper::Node::Text(text) => element.children.push(Node::Text(text.to_string())),
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    element.children.push(Node::Element(convert(child_el)));
                }
            }
            _ => {}
        }
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_builds_document_root() {
        let doc = parse_document("<p class=\"a\">Hi<b>there</b></p>").expect("parse");
        assert_eq!(doc.tag(), Some(DOCUMENT_TAG));

        let html = &doc.children()[0];
        assert_eq!(html.tag(), Some("html"));
        let body = html
            .children()
            .iter()
            .find(|n| n.tag() == Some("body"))
            .expect("body");
        let p = body.children()[0].as_element().expect("p element");
        assert_eq!(p.tag, "p");
        assert_eq!(p.attr("class"), Some("a"));
        assert_eq!(p.children[0], Node::text("Hi"));
    }

    #[test]
    fn blank_input_is_a_parse_error() {
        assert!(parse_document("").is_err());
        assert!(parse_document("  \n\t").is_err());
    }

    #[test]
    fn comments_are_dropped() {
        let doc = parse_document("<div><!-- hidden -->shown</div>").expect("parse");
        assert!(!doc.to_html().contains("hidden"));
        assert!(doc.to_html().contains("shown"));
    }

    #[test]
    fn serialize_escapes() {
        let node = Node::from(
            Element::new("a")
                .with_attr("title", "say \"hi\"")
                .with_child(Node::text("1 < 2 & 3")),
        );
        assert_eq!(
            node.to_html(),
            "<a title=\"say &quot;hi&quot;\">1 &lt; 2 &amp; 3</a>"
        );
        assert_eq!(node.size(), 2);
    }
}
