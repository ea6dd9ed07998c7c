//! Core domain types for the Gatherbox catalog.
//!
//! The serialized field names mirror the legacy checkpoint shape
//! (`name`, `id`, `editions`, `multiverse_id`, `set`, ...) so existing
//! catalog files keep loading.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run in logs (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ExternalId
// ---------------------------------------------------------------------------

/// Key of one fetchable unit at the remote source (a multiverse id).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExternalId(pub u64);

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExternalId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Derive the stable identity of a record.
///
/// The identity is the hex SHA-256 of the name. When two layout variants
/// share a name, the caller passes a disambiguator which is hashed after a
/// unit separator.
pub fn identity_for(name: &str, disambiguator: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    if let Some(extra) = disambiguator {
        hasher.update([0x1f]);
        hasher.update(extra.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// How a paired record is physically linked to its partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Special {
    Split,
    DoubleFaced,
    Flip,
}

impl Special {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::DoubleFaced => "double-faced",
            Self::Flip => "flip",
        }
    }
}

/// Which half of a document a record was extracted from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Normal,
    /// First record of a linked pair.
    Front,
    /// Second record of a linked pair.
    Back,
}

impl LayoutKind {
    pub fn is_normal(&self) -> bool {
        *self == Self::Normal
    }
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

/// One appearance of a record at the source, keyed by [`ExternalId`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printing {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub watermark: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rarity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artist: String,
    pub multiverse_id: ExternalId,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub flavor_text: Vec<String>,
    /// Collector number.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub number: String,
}

impl Printing {
    /// A printing known only by its id (discovered through a cross-reference).
    pub fn stub(id: ExternalId) -> Self {
        Self {
            multiverse_id: id,
            ..Self::default()
        }
    }

    /// A printing whose descriptive fields are still unknown.
    pub fn is_incomplete(&self) -> bool {
        self.set.is_empty()
    }

    /// Adopt every field `incoming` knows and `self` does not.
    ///
    /// Non-empty fields of `self` are never overwritten. Returns `true` if
    /// anything changed.
    pub fn fill_from(&mut self, incoming: &Printing) -> bool {
        let mut changed = false;
        changed |= fill_string(&mut self.set, &incoming.set);
        changed |= fill_string(&mut self.watermark, &incoming.watermark);
        changed |= fill_string(&mut self.rarity, &incoming.rarity);
        changed |= fill_string(&mut self.artist, &incoming.artist);
        changed |= fill_string(&mut self.number, &incoming.number);
        changed |= fill_vec(&mut self.flavor_text, &incoming.flavor_text);
        changed
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One logical catalog entity (a card), identified by `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    /// Content-derived identity, see [`identity_for`].
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub subtypes: Vec<String>,
    #[serde(default)]
    pub converted_cost: u32,
    #[serde(default)]
    pub mana_cost: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<Special>,
    #[serde(default, skip_serializing_if = "LayoutKind::is_normal")]
    pub layout: LayoutKind,
    /// Identity of the other half of a paired record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_card: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub rules_text: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub color_indicator: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub power: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub toughness: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub loyalty: u32,
    /// Printings, unique by `multiverse_id`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub editions: Vec<Printing>,
}

impl Record {
    /// A record with the given name, its identity derived from the name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: identity_for(&name, None),
            name,
            ..Self::default()
        }
    }

    /// Builder-style helper appending a printing.
    pub fn with_printing(mut self, printing: Printing) -> Self {
        self.editions.push(printing);
        self
    }

    pub fn printing(&self, id: ExternalId) -> Option<&Printing> {
        self.editions.iter().find(|p| p.multiverse_id == id)
    }

    /// Fill record-level fields that are empty here but known in `incoming`.
    ///
    /// Printings are not touched; merging them is the catalog's job.
    pub fn fill_from(&mut self, incoming: &Record) -> bool {
        let mut changed = false;
        changed |= fill_vec(&mut self.types, &incoming.types);
        changed |= fill_vec(&mut self.subtypes, &incoming.subtypes);
        changed |= fill_string(&mut self.mana_cost, &incoming.mana_cost);
        changed |= fill_vec(&mut self.rules_text, &incoming.rules_text);
        changed |= fill_vec(&mut self.color_indicator, &incoming.color_indicator);
        changed |= fill_string(&mut self.power, &incoming.power);
        changed |= fill_string(&mut self.toughness, &incoming.toughness);
        if self.converted_cost == 0 && incoming.converted_cost != 0 {
            self.converted_cost = incoming.converted_cost;
            changed = true;
        }
        if self.loyalty == 0 && incoming.loyalty != 0 {
            self.loyalty = incoming.loyalty;
            changed = true;
        }
        if self.special.is_none() && incoming.special.is_some() {
            self.special = incoming.special;
            changed = true;
        }
        if self.layout.is_normal() && !incoming.layout.is_normal() {
            self.layout = incoming.layout;
            changed = true;
        }
        if self.partner_card.is_none() && incoming.partner_card.is_some() {
            self.partner_card.clone_from(&incoming.partner_card);
            changed = true;
        }
        changed
    }
}

fn fill_string(target: &mut String, incoming: &str) -> bool {
    if target.is_empty() && !incoming.is_empty() {
        *target = incoming.to_string();
        true
    } else {
        false
    }
}

fn fill_vec(target: &mut Vec<String>, incoming: &[String]) -> bool {
    if target.is_empty() && !incoming.is_empty() {
        *target = incoming.to_vec();
        true
    } else {
        false
    }
}

/// Older checkpoints wrote absent lists as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_stable_and_hex() {
        let a = identity_for("Academy at Tolaria West", None);
        assert_eq!(a.len(), 64);
        assert_eq!(a, identity_for("Academy at Tolaria West", None));
        assert_ne!(a, identity_for("Academy at Tolaria West", Some("back")));
        assert_eq!(
            identity_for("hello world", None),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn printing_fill_keeps_known_fields() {
        let mut existing = Printing {
            set: "Foo".into(),
            ..Printing::stub(ExternalId(1))
        };
        let incoming = Printing {
            artist: "Rebecca Guay".into(),
            ..Printing::stub(ExternalId(1))
        };

        assert!(existing.fill_from(&incoming));
        assert_eq!(existing.set, "Foo");
        assert_eq!(existing.artist, "Rebecca Guay");
        assert!(!existing.fill_from(&incoming));
    }

    #[test]
    fn empty_fields_are_omitted() {
        let record = Record::named("Shock").with_printing(Printing::stub(ExternalId(7)));
        let json = serde_json::to_value(&record).expect("serialize");

        assert_eq!(json["name"], "Shock");
        assert_eq!(json["editions"][0]["multiverse_id"], 7);
        assert!(json.get("subtypes").is_none());
        assert!(json.get("partner_card").is_none());
        assert!(json.get("layout").is_none());
        assert!(json["editions"][0].get("set").is_none());
    }

    #[test]
    fn legacy_shape_deserializes() {
        let blob = r#"{
            "name": "Fire",
            "id": "abc",
            "types": ["instant"],
            "converted_cost": 2,
            "mana_cost": "{1}{R}",
            "special": "split",
            "partner_card": "def",
            "rules_text": ["Fire deals 2 damage divided as you choose."],
            "editions": [{"set": "Invasion", "multiverse_id": 27165, "rarity": "uncommon"}]
        }"#;
        let record: Record = serde_json::from_str(blob).expect("deserialize");
        assert_eq!(record.special, Some(Special::Split));
        assert_eq!(record.layout, LayoutKind::Normal);
        assert_eq!(record.editions[0].multiverse_id, ExternalId(27165));
        assert_eq!(record.editions[0].set, "Invasion");
    }

    #[test]
    fn null_lists_deserialize_as_empty() {
        let blob = r#"{"name": "Ornithopter", "id": "x", "types": ["artifact", "creature"],
            "subtypes": null, "rules_text": null,
            "editions": [{"multiverse_id": 1, "flavor_text": null}]}"#;
        let record: Record = serde_json::from_str(blob).expect("deserialize");
        assert!(record.subtypes.is_empty());
        assert!(record.rules_text.is_empty());
        assert!(record.editions[0].flavor_text.is_empty());
    }

    #[test]
    fn record_fill_never_clears() {
        let mut existing = Record::named("Bushi Tenderfoot");
        existing.power = "1".into();
        let mut incoming = Record::named("Bushi Tenderfoot");
        incoming.toughness = "1".into();
        incoming.special = Some(Special::Flip);

        assert!(existing.fill_from(&incoming));
        assert_eq!(existing.power, "1");
        assert_eq!(existing.toughness, "1");
        assert_eq!(existing.special, Some(Special::Flip));
    }

    #[test]
    fn external_id_parses_trimmed() {
        let id: ExternalId = " 198073 ".parse().expect("parse");
        assert_eq!(id, ExternalId(198073));
        assert!("abc".parse::<ExternalId>().is_err());
    }
}
