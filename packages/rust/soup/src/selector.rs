//! Descendant-chain selectors.
//!
//! Grammar: whitespace-separated compounds. A compound is an optional tag
//! name (or `*`) followed by any number of `#id` and `.class` modifiers:
//! `div`, `#main`, `.value`, `span.rarity#x`, `#nameRow .value img`.

use std::fmt;
use std::str::FromStr;

use gatherbox_shared::{GatherError, Result};

use crate::node::Element;

/// One compound selector: every constraint must hold for an element to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    /// Whether `el` satisfies this compound.
    ///
    /// An id constraint requires exactly one `id` attribute equal to the value;
    /// a class constraint requires the whitespace-split `class` attribute to
    /// contain the value.
    pub fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            let mut ids = el.attrs.iter().filter(|(k, _)| k == "id");
            match (ids.next(), ids.next()) {
                (Some((_, value)), None) if value == id => {}
                _ => return false,
            }
        }

        if !self.classes.is_empty() {
            let class_attr = el.attr("class").unwrap_or("");
            let all_present = self
                .classes
                .iter()
                .all(|wanted| class_attr.split_whitespace().any(|c| c == wanted));
            if !all_present {
                return false;
            }
        }

        true
    }
}

/// A parsed selector: compounds related by the descendant combinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    chain: Vec<Compound>,
}

impl Selector {
    /// Parse a selector string.
    pub fn parse(source: &str) -> Result<Self> {
        let chain = source
            .split_whitespace()
            .map(|token| parse_compound(source, token))
            .collect::<Result<Vec<_>>>()?;

        if chain.is_empty() {
            return Err(GatherError::selector(source, "empty selector"));
        }

        Ok(Self {
            source: source.to_string(),
            chain,
        })
    }

    pub fn chain(&self) -> &[Compound] {
        &self.chain
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Selector {
    type Err = GatherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(source: &str, token: &str) -> Result<Compound> {
    let mut compound = Compound::default();
    let mut rest = token;

    let tag_len = rest
        .find(|c: char| !is_name_char(c))
        .unwrap_or(rest.len());
    if tag_len > 0 {
        compound.tag = Some(rest[..tag_len].to_ascii_lowercase());
        rest = &rest[tag_len..];
    } else if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    }

    while let Some(marker) = rest.chars().next() {
        let body = &rest[marker.len_utf8()..];
        let len = body
            .find(|c: char| !is_name_char(c))
            .unwrap_or(body.len());
        let name = &body[..len];

        match marker {
            '#' | '.' if name.is_empty() => {
                return Err(GatherError::selector(
                    source,
                    format!("missing name after '{marker}' in {token:?}"),
                ));
            }
            '#' if compound.id.is_some() => {
                return Err(GatherError::selector(
                    source,
                    format!("more than one id in {token:?}"),
                ));
            }
            '#' => compound.id = Some(name.to_string()),
            '.' => compound.classes.push(name.to_string()),
            other => {
                return Err(GatherError::selector(
                    source,
                    format!("unsupported character {other:?} in {token:?}"),
                ));
            }
        }
        rest = &body[len..];
    }

    Ok(compound)
}
