//! Card-detail extractor.
//!
//! Detail pages prefix every row id with a fixed ASP.NET control path. A
//! single card uses one prefix; linked pairs (split, double-faced and flip
//! cards) render each half under its own control prefix, so the layout is
//! detected by probing for rows that only exist under a paired prefix.

use std::sync::LazyLock;

use gatherbox_shared::{
    ExternalId, GatherError, LayoutKind, Printing, Record, Result, Special, identity_for,
};
use gatherbox_soup::{Node, Selector, SymbolMap, attr, find, find_all, flatten_text, flatten_with};
use tracing::debug;
use url::Url;

use super::RecordExtractor;
use super::symbols::mana_symbols;

const PREFIX_SINGLE: &str = "#ctl00_ctl00_ctl00_MainContent_SubContent_SubContent_";
const PREFIX_FRONT: &str = "#ctl00_ctl00_ctl00_MainContent_SubContent_SubContent_ctl07_";
const PREFIX_BACK: &str = "#ctl00_ctl00_ctl00_MainContent_SubContent_SubContent_ctl08_";
const PREFIX_LEFT: &str = "#ctl00_ctl00_ctl00_MainContent_SubContent_SubContent_ctl09_";
const PREFIX_RIGHT: &str = "#ctl00_ctl00_ctl00_MainContent_SubContent_SubContent_ctl10_";

/// Base for relative links on a detail page; only query strings are read.
static DETAIL_BASE: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://gatherer.wizards.com/Pages/Card/").expect("detail base url")
});

// ---------------------------------------------------------------------------
// Row selectors
// ---------------------------------------------------------------------------

/// Every selector needed to read one card half, compiled for one prefix.
#[derive(Debug, Clone)]
struct Rows {
    name: Selector,
    mana: Selector,
    cmc: Selector,
    text: Selector,
    pt: Selector,
    color_indicator_row: Selector,
    color_indicator: Selector,
    types: Selector,
    number: Selector,
    artist: Selector,
    set: Selector,
    flavor: Selector,
    rarity: Selector,
    watermark: Selector,
    image: Selector,
    other_sets: Selector,
}

impl Rows {
    fn new(prefix: &str) -> Result<Self> {
        let sel = |rest: &str| Selector::parse(&format!("{prefix}{rest}"));
        Ok(Self {
            name: sel("nameRow .value")?,
            mana: sel("manaRow .value img")?,
            cmc: sel("cmcRow .value")?,
            text: sel("textRow .value .cardtextbox")?,
            pt: sel("ptRow .value")?,
            color_indicator_row: sel("colorIndicatorRow")?,
            color_indicator: sel("colorIndicatorRow .value")?,
            types: sel("typeRow .value")?,
            number: sel("numberRow .value")?,
            artist: sel("artistRow .value")?,
            set: sel("setRow .value")?,
            flavor: sel("flavorRow .value .cardtextbox")?,
            rarity: sel("rarityRow .value span")?,
            watermark: sel("markRow .value")?,
            image: sel("cardImage")?,
            other_sets: sel("otherSetsValue a")?,
        })
    }
}

/// How the halves of a detail page are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Single,
    Paired(Special),
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Extracts cards from Gatherer card-detail pages.
#[derive(Debug, Clone)]
pub struct GathererExtractor {
    single: Rows,
    front: Rows,
    back: Rows,
    left: Rows,
    right: Rows,
    symbols: SymbolMap,
}

impl GathererExtractor {
    /// Compile the row selectors for every layout.
    pub fn new() -> Result<Self> {
        Ok(Self {
            single: Rows::new(PREFIX_SINGLE)?,
            front: Rows::new(PREFIX_FRONT)?,
            back: Rows::new(PREFIX_BACK)?,
            left: Rows::new(PREFIX_LEFT)?,
            right: Rows::new(PREFIX_RIGHT)?,
            symbols: mana_symbols(),
        })
    }

    fn detect(&self, doc: &Node) -> Layout {
        if find(doc, &self.left.image).is_some() {
            Layout::Paired(Special::Split)
        } else if find(doc, &self.back.color_indicator_row).is_some() {
            Layout::Paired(Special::DoubleFaced)
        } else if find(doc, &self.front.image).is_some() {
            Layout::Paired(Special::Flip)
        } else {
            Layout::Single
        }
    }

    fn halves(&self, special: Special) -> (&Rows, &Rows) {
        match special {
            Special::Split => (&self.left, &self.right),
            Special::DoubleFaced | Special::Flip => (&self.front, &self.back),
        }
    }

    fn parse_card(&self, doc: &Node, rows: &Rows, requested: ExternalId) -> Record {
        let mut card = Record::named(extract_string(doc, &rows.name));

        card.mana_cost = find_all(doc, &rows.mana)
            .filter_map(|img| img.as_element())
            .filter_map(|el| self.symbols.token_for(el))
            .collect();
        card.converted_cost = extract_int(doc, &rows.cmc);
        card.rules_text = self.extract_text(doc, &rows.text);
        card.loyalty = extract_int(doc, &rows.pt);
        card.color_indicator = extract_color_indicator(doc, &rows.color_indicator);
        (card.types, card.subtypes) = extract_types(doc, &rows.types);
        (card.power, card.toughness) = extract_pt(doc, &rows.pt);

        let own_id = find(doc, &rows.image)
            .and_then(|img| id_from_link(attr(img, "src")))
            .unwrap_or(requested);

        let printing = Printing {
            set: extract_string(doc, &rows.set),
            watermark: extract_string(doc, &rows.watermark),
            rarity: find(doc, &rows.rarity)
                .map(|span| attr(span, "class").trim().to_string())
                .unwrap_or_default(),
            artist: extract_string(doc, &rows.artist),
            multiverse_id: own_id,
            flavor_text: self.extract_text(doc, &rows.flavor),
            number: extract_string(doc, &rows.number),
        };

        let mut ids: Vec<ExternalId> = find_all(doc, &rows.other_sets)
            .filter_map(|a| id_from_link(attr(a, "href")))
            .collect();
        ids.push(own_id);
        ids.sort_unstable();
        ids.dedup();

        card.editions = ids
            .into_iter()
            .map(|id| {
                if id == own_id {
                    printing.clone()
                } else {
                    Printing::stub(id)
                }
            })
            .collect();

        card
    }

    /// Trimmed, non-empty text of every match, with inline symbols.
    fn extract_text(&self, doc: &Node, selector: &Selector) -> Vec<String> {
        find_all(doc, selector)
            .map(|node| flatten_with(node, &self.symbols).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

impl RecordExtractor for GathererExtractor {
    fn extract(&self, doc: &Node, requested: ExternalId) -> Result<Vec<Record>> {
        let layout = self.detect(doc);
        debug!(%requested, ?layout, "extracting card");

        let cards = match layout {
            Layout::Single => vec![self.parse_card(doc, &self.single, requested)],
            Layout::Paired(special) => {
                let (first, second) = self.halves(special);
                let mut a = self.parse_card(doc, first, requested);
                let mut b = self.parse_card(doc, second, requested);
                link_pair(&mut a, &mut b, special);
                vec![a, b]
            }
        };

        if cards.iter().all(|card| card.name.is_empty()) {
            return Err(GatherError::Extraction(format!(
                "no card name on detail page for {requested}"
            )));
        }
        Ok(cards)
    }

    fn name(&self) -> &str {
        "gatherer"
    }
}

/// Cross-link the two halves of a paired card.
///
/// Halves that share a name get their layout hashed into the identity so the
/// two records stay distinct.
fn link_pair(a: &mut Record, b: &mut Record, special: Special) {
    a.layout = LayoutKind::Front;
    b.layout = LayoutKind::Back;
    a.special = Some(special);
    b.special = Some(special);

    if a.name == b.name {
        a.id = identity_for(&a.name, Some("front"));
        b.id = identity_for(&b.name, Some("back"));
    }

    a.partner_card = Some(b.id.clone());
    b.partner_card = Some(a.id.clone());
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn extract_string(doc: &Node, selector: &Selector) -> String {
    find(doc, selector)
        .map(|node| flatten_text(node).trim().to_string())
        .unwrap_or_default()
}

/// Integer value of a row, zero when absent or not a number.
fn extract_int(doc: &Node, selector: &Selector) -> u32 {
    find(doc, selector)
        .and_then(|node| flatten_text(node).trim().parse().ok())
        .unwrap_or(0)
}

/// `"Creature — Human Wizard"` becomes `(["creature"], ["human", "wizard"])`.
fn extract_types(doc: &Node, selector: &Selector) -> (Vec<String>, Vec<String>) {
    let Some(node) = find(doc, selector) else {
        return (Vec::new(), Vec::new());
    };
    let line = flatten_text(node).trim().to_lowercase();
    let words = |s: &str| s.split_whitespace().map(str::to_string).collect::<Vec<_>>();

    match line.split_once('\u{2014}') {
        Some((types, subtypes)) => (words(types), words(subtypes)),
        None => (words(&line), Vec::new()),
    }
}

fn extract_pt(doc: &Node, selector: &Selector) -> (String, String) {
    let Some(node) = find(doc, selector) else {
        return (String::new(), String::new());
    };
    let text = flatten_text(node);
    let parts: Vec<&str> = text.trim().split('/').collect();
    match parts.as_slice() {
        [power, toughness] => (power.trim().to_string(), toughness.trim().to_string()),
        _ => (String::new(), String::new()),
    }
}

fn extract_color_indicator(doc: &Node, selector: &Selector) -> Vec<String> {
    find(doc, selector)
        .map(|node| {
            flatten_text(node)
                .split(',')
                .map(|color| color.trim().to_lowercase())
                .filter(|color| !color.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// The `multiverseid` query parameter of a (possibly relative) link.
fn id_from_link(link: &str) -> Option<ExternalId> {
    let url = DETAIL_BASE.join(link).ok()?;
    let (_, value) = url.query_pairs().find(|(k, _)| k == "multiverseid")?;
    value.parse().ok()
}
