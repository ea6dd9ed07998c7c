//! Inline mana and action symbols.
//!
//! The detail page renders symbols as `<img alt="...">`; each known alt text
//! maps to its brace token.

use gatherbox_soup::SymbolMap;

const SYMBOLS: &[(&str, &str)] = &[
    ("0", "{0}"),
    ("1", "{1}"),
    ("2", "{2}"),
    ("3", "{3}"),
    ("4", "{4}"),
    ("5", "{5}"),
    ("6", "{6}"),
    ("7", "{7}"),
    ("8", "{8}"),
    ("9", "{9}"),
    ("10", "{10}"),
    ("11", "{11}"),
    ("12", "{12}"),
    ("13", "{13}"),
    ("14", "{14}"),
    ("15", "{15}"),
    ("Phyrexian", "{P}"),
    ("Phyrexian White", "{W/P}"),
    ("Phyrexian Blue", "{U/P}"),
    ("Phyrexian Black", "{B/P}"),
    ("Phyrexian Red", "{R/P}"),
    ("Phyrexian Green", "{G/P}"),
    ("White or Blue", "{W/U}"),
    ("White or Black", "{W/B}"),
    ("Blue or Black", "{U/B}"),
    ("Blue or Red", "{U/R}"),
    ("Black or Red", "{B/R}"),
    ("Black or Green", "{B/G}"),
    ("Red or Green", "{R/G}"),
    ("Red or White", "{R/W}"),
    ("Green or White", "{G/W}"),
    ("Green or Blue", "{G/U}"),
    ("Two or White", "{2/W}"),
    ("Two or Blue", "{2/U}"),
    ("Two or Black", "{2/B}"),
    ("Two or Red", "{2/R}"),
    ("Two or Green", "{2/G}"),
    ("Variable Colorless", "{X}"),
    ("Snow", "{S}"),
    ("White", "{W}"),
    ("Blue", "{U}"),
    ("Black", "{B}"),
    ("Red", "{R}"),
    ("Green", "{G}"),
    ("Tap", "{T}"),
    ("Untap", "{Q}"),
    ("[chaos]", "{C}"),
];

/// Symbol map for `<img alt="...">` markers.
pub fn mana_symbols() -> SymbolMap {
    SYMBOLS
        .iter()
        .fold(SymbolMap::new("img", "alt"), |map, (alt, token)| {
            map.with(*alt, *token)
        })
}
