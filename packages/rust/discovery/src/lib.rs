//! Paged listing discovery.
//!
//! The remote source exposes a paged search listing. Each page names a batch
//! of candidate records together with the id of one of their printings; the
//! first page also reports the total number of results, from which the page
//! count is derived. This crate turns a parsed listing page into
//! [`Candidate`]s. Fetching is left to the caller.

mod parser;

use gatherbox_shared::ExternalId;

pub use parser::parse_listing;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One discovery hit: enough to decide whether the record is already known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Trimmed display name.
    pub name: String,
    /// Printing id the detail page is fetched by.
    pub external_id: ExternalId,
    /// Identity derived from the name, comparable to `Record::id`.
    pub identity: String,
}

/// A parsed listing page.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Candidates in document order.
    pub candidates: Vec<Candidate>,
    /// Total result count across all pages, when the page reports it.
    pub total: Option<usize>,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Number of listing pages needed for `total` results, `ceil(total / page_size)`.
///
/// A zero page size yields zero pages.
pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 100), 0);
        assert_eq!(page_count(1, 100), 1);
        assert_eq!(page_count(100, 100), 1);
        assert_eq!(page_count(101, 100), 2);
        assert_eq!(page_count(20_345, 100), 204);
    }

    #[test]
    fn page_count_zero_page_size() {
        assert_eq!(page_count(10, 0), 0);
    }
}
