//! Minimal selector engine over an owned document tree.
//!
//! This crate provides:
//! - [`Node`] / [`Element`] — the document model, built by [`parse_document`]
//! - [`Selector`] — tag / `#id` / `.class` compounds joined by descendant
//!   combinators
//! - [`find`] / [`find_all`] — first match and all matches in document order
//! - [`attr`], [`flatten_text`], [`flatten_with`] — extraction helpers
//!
//! Matching walks the tree once per call: each node is checked against at
//! most one compound, so the cost is linear in the size of the searched
//! subtree whatever the selector length. No match is a normal outcome.

mod node;
mod selector;

use std::collections::HashMap;

pub use node::{DOCUMENT_TAG, Element, Node, parse_document};
pub use selector::{Compound, Selector};

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Iterator over the nodes matching a selector, in document order.
///
/// Each stack entry carries how many leading compounds of the chain are
/// already satisfied by the node's ancestors. Satisfying them greedily with
/// the nearest qualifying ancestor chain is sufficient for descendant
/// combinators, so every match is yielded exactly once.
pub struct Matches<'a, 's> {
    chain: &'s [Compound],
    stack: Vec<(&'a Node, usize)>,
}

impl<'a> Iterator for Matches<'a, '_> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let last = self.chain.len().checked_sub(1)?;

        while let Some((node, progress)) = self.stack.pop() {
            let Node::Element(el) = node else {
                continue;
            };

            let matched_here = self.chain[progress].matches(el);
            let child_progress = if matched_here && progress < last {
                progress + 1
            } else {
                progress
            };
            self.stack
                .extend(el.children.iter().rev().map(|child| (child, child_progress)));

            if matched_here && progress == last {
                return Some(node);
            }
        }
        None
    }
}

/// All nodes under (and including) `root` matching `selector`, in document order.
pub fn find_all<'a, 's>(root: &'a Node, selector: &'s Selector) -> Matches<'a, 's> {
    Matches {
        chain: selector.chain(),
        stack: vec![(root, 0)],
    }
}

/// The first node in document order matching `selector`.
pub fn find<'a>(root: &'a Node, selector: &Selector) -> Option<&'a Node> {
    find_all(root, selector).next()
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

/// Attribute value, or `""` when absent or when `node` is text.
pub fn attr<'a>(node: &'a Node, key: &str) -> &'a str {
    node.as_element()
        .and_then(|el| el.attr(key))
        .unwrap_or("")
}

/// Concatenation of every text leaf under `node`, in document order.
///
/// No trimming is applied.
pub fn flatten_text(node: &Node) -> String {
    let mut out = String::new();
    push_text(node, None, &mut out);
    out
}

/// Like [`flatten_text`], but marker elements described by `symbols` are
/// replaced by their mapped token.
pub fn flatten_with(node: &Node, symbols: &SymbolMap) -> String {
    let mut out = String::new();
    push_text(node, Some(symbols), &mut out);
    out
}

fn push_text(node: &Node, symbols: Option<&SymbolMap>, out: &mut String) {
    match node {
        Node::Text(value) => out.push_str(value),
        Node::Element(el) => {
            if let Some(token) = symbols.and_then(|map| map.token_for(el)) {
                out.push_str(token);
                return;
            }
            for child in &el.children {
                push_text(child, symbols, out);
            }
        }
    }
}

/// Maps inline marker elements (e.g. `<img alt="Tap">`) to text tokens.
///
/// An element is a marker when its tag equals the map's tag and the value
/// of the map's attribute has a token. Any other element, including one
/// with the right tag and an unknown value, is flattened as usual.
#[derive(Debug, Clone)]
pub struct SymbolMap {
    tag: String,
    attr: String,
    tokens: HashMap<String, String>,
}

impl SymbolMap {
    pub fn new(tag: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attr: attr.into(),
            tokens: HashMap::new(),
        }
    }

    pub fn with(mut self, value: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(value.into(), token.into());
        self
    }

    /// Whether `el` carries the marker tag.
    pub fn is_marker(&self, el: &Element) -> bool {
        el.tag.eq_ignore_ascii_case(&self.tag)
    }

    /// Token for an attribute value, independent of any element.
    pub fn token(&self, value: &str) -> Option<&str> {
        self.tokens.get(value).map(String::as_str)
    }

    /// Token for `el`, or `None` when it is not a marker.
    pub fn token_for(&self, el: &Element) -> Option<&str> {
        if !self.is_marker(el) {
            return None;
        }
        el.attr(&self.attr).and_then(|value| self.token(value))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
