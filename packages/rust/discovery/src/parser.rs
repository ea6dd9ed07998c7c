//! Listing page parser.
//!
//! - Candidates: `.cardItem .name a` links; the link text is the name and
//!   the `multiverseid` query parameter is the printing id.
//! - Total: the search-term header ends with the result count in
//!   parentheses, e.g. `Search: ... (20345)`.

use std::sync::LazyLock;

use gatherbox_shared::{ExternalId, Result, identity_for};
use gatherbox_soup::{Node, Selector, attr, find, find_all, flatten_text};
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::{Candidate, Listing};

/// Resolves relative candidate links; only the query string is read.
static LINK_BASE: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://gatherer.wizards.com/Pages/Search/").expect("link base url")
});

static CANDIDATE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".cardItem .name a").expect("candidate selector"));

static RESULT_HEADER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#ctl00_ctl00_ctl00_MainContent_SubContent_SubContentHeader_searchTermDisplay")
        .expect("result header selector")
});

/// Matches a trailing `(N)`; thousands separators are tolerated.
static RESULT_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*([\d,]+)\s*\)\s*$").expect("result count regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Extract candidates and the total result count from a listing page.
///
/// Links without a usable `multiverseid` are skipped with a warning. A page
/// without a result header yields `total: None`.
pub fn parse_listing(doc: &Node) -> Result<Listing> {
    let mut candidates = Vec::new();
    for link in find_all(doc, &CANDIDATE_LINK) {
        let href = attr(link, "href");
        let name = flatten_text(link).trim().to_string();

        let Some(external_id) = external_id_from_href(&LINK_BASE, href) else {
            warn!(%href, %name, "skipping listing entry without a multiverseid");
            continue;
        };
        if name.is_empty() {
            warn!(%external_id, "skipping unnamed listing entry");
            continue;
        }

        candidates.push(Candidate {
            identity: identity_for(&name, None),
            name,
            external_id,
        });
    }

    let total = result_count(doc);
    debug!(candidates = candidates.len(), ?total, "parsed listing page");

    Ok(Listing { candidates, total })
}

fn external_id_from_href(base: &Url, href: &str) -> Option<ExternalId> {
    let url = base.join(href).ok()?;
    let (_, value) = url.query_pairs().find(|(k, _)| k == "multiverseid")?;
    value.parse().ok()
}

fn result_count(doc: &Node) -> Option<usize> {
    let header = find(doc, &RESULT_HEADER)?;
    let text = flatten_text(header);
    let caps = RESULT_COUNT_RE.captures(text.trim())?;
    caps[1].replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatherbox_soup::parse_document;

    fn listing_page(items: &str, header: Option<&str>) -> String {
        let header = header
            .map(|h| {
                format!(
                    r#"<span id="ctl00_ctl00_ctl00_MainContent_SubContent_SubContentHeader_searchTermDisplay">{h}</span>"#
                )
            })
            .unwrap_or_default();
        format!(r#"<html><body>{header}<table>{items}</table></body></html>"#)
    }

    fn item(name: &str, href: &str) -> String {
        format!(
            r#"<tr class="cardItem"><td class="name"><a href="{href}"> {name} </a></td><td class="mana">x</td></tr>"#
        )
    }

    #[test]
    fn parses_candidates_and_total() {
        let items = [
            item("Shock", "../Card/Details.aspx?multiverseid=129732"),
            item("Lightning Bolt", "/Pages/Card/Details.aspx?multiverseid=209"),
        ]
        .concat();
        let html = listing_page(&items, Some("Search: cmc &gt;= 0 (20345)"));
        let doc = parse_document(&html).expect("parse");

        let listing = parse_listing(&doc).expect("listing");
        assert_eq!(listing.total, Some(20_345));
        assert_eq!(listing.candidates.len(), 2);

        let shock = &listing.candidates[0];
        assert_eq!(shock.name, "Shock");
        assert_eq!(shock.external_id, ExternalId(129_732));
        assert_eq!(shock.identity, identity_for("Shock", None));
        assert_eq!(listing.candidates[1].external_id, ExternalId(209));
    }

    #[test]
    fn missing_header_yields_no_total() {
        let html = listing_page(&item("Shock", "Details.aspx?multiverseid=1"), None);
        let doc = parse_document(&html).expect("parse");

        let listing = parse_listing(&doc).expect("listing");
        assert_eq!(listing.total, None);
        assert_eq!(listing.candidates.len(), 1);
    }

    #[test]
    fn header_without_count_yields_no_total() {
        let html = listing_page("", Some("Search: everything"));
        let doc = parse_document(&html).expect("parse");
        assert_eq!(parse_listing(&doc).expect("listing").total, None);
    }

    #[test]
    fn count_with_separators() {
        let html = listing_page("", Some("Search results (1,234)"));
        let doc = parse_document(&html).expect("parse");
        assert_eq!(parse_listing(&doc).expect("listing").total, Some(1234));
    }

    #[test]
    fn malformed_links_are_skipped() {
        let items = [
            item("No Id", "Details.aspx?name=foo"),
            item("Bad Id", "Details.aspx?multiverseid=abc"),
            item("Good", "Details.aspx?multiverseid=7"),
        ]
        .concat();
        let doc = parse_document(&listing_page(&items, Some("(3)"))).expect("parse");

        let listing = parse_listing(&doc).expect("listing");
        assert_eq!(listing.candidates.len(), 1);
        assert_eq!(listing.candidates[0].name, "Good");
        assert_eq!(listing.total, Some(3));
    }
}
