//! Durable catalog representation.
//!
//! A checkpoint is one JSON document: a bare array of records sorted by
//! name. Files written by older versions wrap the array as
//! `{"cards": [...]}`; both shapes load.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use gatherbox_shared::{GatherError, LayoutKind, Record, Result, identity_for};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::Catalog;

/// Legacy checkpoint envelope.
#[derive(Deserialize)]
struct Envelope {
    cards: Vec<Record>,
}

impl Catalog {
    /// Load a catalog from a checkpoint file.
    ///
    /// A missing file yields an empty catalog. A file that exists but cannot
    /// be read or decoded is an error: starting empty would let the next
    /// checkpoint overwrite it.
    ///
    /// Identities written by older versions are re-derived from the record
    /// name, and partner links are rewritten to match.
    pub fn load(path: &Path) -> Result<Self> {
        let present = path
            .try_exists()
            .map_err(|e| GatherError::checkpoint(path, format!("cannot stat: {e}")))?;
        if !present {
            warn!(path = %path.display(), "no checkpoint found, starting with an empty catalog");
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GatherError::checkpoint(path, format!("failed to read: {e}")))?;
        let mut records = decode(&content)
            .map_err(|e| GatherError::checkpoint(path, format!("failed to decode: {e}")))?;

        let rekeyed = rekey(&mut records);
        if rekeyed > 0 {
            info!(rekeyed, "re-derived legacy record identities");
        }

        let mut catalog = Self::new();
        let mut skipped = 0usize;
        for record in records {
            if let Err(e) = catalog.add(record) {
                warn!(error = %e, "skipping invalid record in checkpoint");
                skipped += 1;
            }
        }

        info!(
            path = %path.display(),
            records = catalog.len(),
            printings = catalog.printing_count(),
            skipped,
            "checkpoint loaded"
        );
        Ok(catalog)
    }

    /// Write every record, sorted by name, to `path`.
    ///
    /// The document is written to a sibling temp file which then replaces
    /// `path`, so a failure part-way leaves the previous checkpoint intact.
    /// Returns the number of records written.
    pub fn checkpoint(&self, path: &Path) -> Result<usize> {
        let mut sorted: Vec<&Record> = self.records().iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let json = serde_json::to_vec_pretty(&sorted)
            .map_err(|e| GatherError::checkpoint(path, format!("failed to encode: {e}")))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| GatherError::checkpoint(path, "path has no file name"))?
            .to_string_lossy();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(|e| GatherError::io(parent, e))?;
                parent
            }
            _ => Path::new("."),
        };
        let temp = dir.join(format!(".{file_name}.tmp"));

        if let Err(e) = write_synced(&temp, &json) {
            let _ = std::fs::remove_file(&temp);
            return Err(GatherError::io(&temp, e));
        }
        std::fs::rename(&temp, path).map_err(|e| GatherError::io(path, e))?;

        debug!(path = %path.display(), records = sorted.len(), bytes = json.len(), "checkpoint written");
        Ok(sorted.len())
    }
}

/// Write `bytes` and flush them to disk before returning.
fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Replace identities that do not match [`identity_for`] and point partner
/// links at the new values. Returns how many records changed.
fn rekey(records: &mut [Record]) -> usize {
    let names: HashMap<String, String> = records
        .iter()
        .map(|r| (r.id.clone(), r.name.clone()))
        .collect();

    let mut renamed: HashMap<String, String> = HashMap::new();
    for record in records.iter_mut() {
        let same_name_pair = record
            .partner_card
            .as_ref()
            .and_then(|partner| names.get(partner))
            .is_some_and(|partner_name| *partner_name == record.name);
        let disambiguator = match (record.layout, same_name_pair) {
            (LayoutKind::Front, true) => Some("front"),
            (LayoutKind::Back, true) => Some("back"),
            _ => None,
        };

        let expected = identity_for(&record.name, disambiguator);
        if record.id != expected {
            let old = std::mem::replace(&mut record.id, expected.clone());
            renamed.insert(old, expected);
        }
    }

    if !renamed.is_empty() {
        for record in records.iter_mut() {
            if let Some(new_id) = record.partner_card.as_ref().and_then(|p| renamed.get(p)) {
                record.partner_card = Some(new_id.clone());
            }
        }
    }
    renamed.len()
}

fn decode(content: &str) -> serde_json::Result<Vec<Record>> {
    if content.trim_start().starts_with('{') {
        serde_json::from_str::<Envelope>(content).map(|envelope| envelope.cards)
    } else {
        serde_json::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use gatherbox_shared::{ExternalId, Printing};
    use uuid::Uuid;

    use super::*;
    use crate::AddOutcome;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gb_test_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn card(name: &str, id: u64, set: &str) -> Record {
        Record::named(name).with_printing(Printing {
            set: set.into(),
            multiverse_id: ExternalId(id),
            ..Printing::default()
        })
    }

    #[test]
    fn roundtrip_preserves_records() {
        let tmp = temp_dir();
        let path = tmp.join("cards.json");

        let mut catalog = Catalog::new();
        catalog.add(card("Shock", 1, "Stronghold")).expect("add");
        let mut bolt = card("Lightning Bolt", 2, "Alpha");
        bolt.rules_text = vec!["Lightning Bolt deals 3 damage to any target.".into()];
        catalog.add(bolt).expect("add");

        assert_eq!(catalog.checkpoint(&path).expect("checkpoint"), 2);
        let loaded = Catalog::load(&path).expect("load");

        assert_eq!(loaded.len(), 2);
        for record in catalog.records() {
            assert_eq!(loaded.get(&record.id), Some(record));
        }
        assert_eq!(loaded.external_ids(), catalog.external_ids());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn output_is_a_bare_array_sorted_by_name() {
        let tmp = temp_dir();
        let path = tmp.join("cards.json");

        let mut catalog = Catalog::new();
        catalog.add(card("Shock", 1, "Stronghold")).expect("add");
        catalog.add(card("Giant Growth", 2, "Alpha")).expect("add");
        catalog.add(card("Ancestral Recall", 3, "Alpha")).expect("add");
        catalog.checkpoint(&path).expect("checkpoint");

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        let names: Vec<&str> = value
            .as_array()
            .expect("bare array")
            .iter()
            .map(|r| r["name"].as_str().expect("name"))
            .collect();
        assert_eq!(names, vec!["Ancestral Recall", "Giant Growth", "Shock"]);

        // empty optional fields are omitted
        let first = &value[0];
        assert!(first.get("subtypes").is_none());
        assert!(first["editions"][0].get("artist").is_none());
        assert_eq!(first["editions"][0]["multiverse_id"], 3);

        // insertion order in memory is untouched
        assert_eq!(catalog.records()[0].name, "Shock");
        assert!(!tmp.join(".cards.json.tmp").exists());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = temp_dir();
        let catalog = Catalog::load(&tmp.join("absent.json")).expect("load");
        assert!(catalog.is_empty());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unreachable_path_is_an_error_not_an_empty_catalog() {
        let tmp = temp_dir();
        let blocker = tmp.join("not-a-dir");
        std::fs::write(&blocker, "x").expect("write blocker");

        let err = Catalog::load(&blocker.join("cards.json")).unwrap_err();
        assert!(matches!(err, GatherError::Checkpoint { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn corrupt_file_is_a_checkpoint_error() {
        let tmp = temp_dir();
        let path = tmp.join("cards.json");
        std::fs::write(&path, "[{\"name\": \"Shock\",").expect("write");

        let err = Catalog::load(&path).unwrap_err();
        assert!(matches!(err, GatherError::Checkpoint { .. }));
        assert!(err.is_fatal());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn loads_legacy_envelope_and_merges_duplicates() {
        let tmp = temp_dir();
        let path = tmp.join("cards.json");
        let shock_id = gatherbox_shared::identity_for("Shock", None);
        let legacy = format!(
            r#"{{"cards": [
                {{"name": "Shock", "id": "{shock_id}", "types": ["instant"], "converted_cost": 1,
                  "mana_cost": "{{R}}", "rules_text": null,
                  "editions": [{{"set": "Stronghold", "multiverse_id": 4}}]}},
                {{"name": "Shock", "id": "{shock_id}", "types": ["instant"], "converted_cost": 1,
                  "mana_cost": "{{R}}", "editions": [{{"multiverse_id": 129732}}]}},
                {{"name": "Broken", "id": "x", "editions": []}}
            ]}}"#
        );
        std::fs::write(&path, legacy).expect("write");

        let catalog = Catalog::load(&path).expect("load");
        assert_eq!(catalog.len(), 1);
        let shock = catalog.get(&shock_id).expect("shock");
        assert_eq!(shock.editions.len(), 2);
        assert_eq!(shock.mana_cost, "{R}");
        assert_eq!(catalog.incomplete_printings(), vec![ExternalId(129732)]);
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn legacy_identities_are_rederived_on_load() {
        let tmp = temp_dir();
        let path = tmp.join("cards.json");
        let legacy = r#"{"cards": [
            {"name": "Shock", "id": "4c2b8e0f53d3c5f1b2ad8a0f4e1d6c7b", "types": ["instant"],
             "editions": [{"set": "Stronghold", "multiverse_id": 4}]},
            {"name": "Fire", "id": "aa11", "layout": "front", "special": "split",
             "partner_card": "bb22", "editions": [{"set": "Apocalypse", "multiverse_id": 27165}]},
            {"name": "Ice", "id": "bb22", "layout": "back", "special": "split",
             "partner_card": "aa11", "editions": [{"set": "Apocalypse", "multiverse_id": 27165}]}
        ]}"#;
        std::fs::write(&path, legacy).expect("write");

        let mut catalog = Catalog::load(&path).expect("load");
        let shock_id = identity_for("Shock", None);
        assert!(catalog.contains_identity(&shock_id));

        let fire = catalog.get(&identity_for("Fire", None)).expect("fire");
        assert_eq!(fire.partner_card, Some(identity_for("Ice", None)));
        let ice = catalog.get(&identity_for("Ice", None)).expect("ice");
        assert_eq!(ice.partner_card, Some(identity_for("Fire", None)));

        // a freshly extracted record merges instead of duplicating
        let outcome = catalog.add(card("Shock", 129732, "Tenth Edition")).expect("add");
        assert!(matches!(outcome, AddOutcome::Merged { new_printings: 1, .. }));
        assert_eq!(catalog.records().iter().filter(|r| r.name == "Shock").count(), 1);
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn same_name_halves_keep_their_disambiguated_identities() {
        let tmp = temp_dir();
        let path = tmp.join("cards.json");

        let front_id = identity_for("Twin", Some("front"));
        let back_id = identity_for("Twin", Some("back"));
        let mut front = card("Twin", 10, "Alpha");
        front.id = front_id.clone();
        front.layout = LayoutKind::Front;
        front.partner_card = Some(back_id.clone());
        let mut back = card("Twin", 10, "Alpha");
        back.id = back_id.clone();
        back.layout = LayoutKind::Back;
        back.partner_card = Some(front_id.clone());

        let mut catalog = Catalog::new();
        catalog.add(front).expect("front");
        catalog.add(back).expect("back");
        catalog.add(card("Apple", 11, "Alpha")).expect("apple");
        catalog.checkpoint(&path).expect("checkpoint");

        // equal names keep insertion order in the file
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        let layouts: Vec<&str> = value
            .as_array()
            .expect("array")
            .iter()
            .map(|r| r.get("layout").and_then(|l| l.as_str()).unwrap_or("normal"))
            .collect();
        assert_eq!(layouts, vec!["normal", "front", "back"]);

        let loaded = Catalog::load(&path).expect("load");
        assert_eq!(loaded.len(), 3);
        assert_eq!(
            loaded.get(&front_id).and_then(|r| r.partner_card.clone()),
            Some(back_id.clone())
        );
        assert_eq!(
            loaded.get(&back_id).and_then(|r| r.partner_card.clone()),
            Some(front_id)
        );
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn checkpoint_overwrites_previous() {
        let tmp = temp_dir();
        let path = tmp.join("nested").join("cards.json");

        let mut catalog = Catalog::new();
        catalog.add(card("Shock", 1, "Stronghold")).expect("add");
        catalog.checkpoint(&path).expect("first");

        catalog.add(card("Opt", 2, "Invasion")).expect("add");
        catalog.checkpoint(&path).expect("second");

        assert_eq!(Catalog::load(&path).expect("load").len(), 2);
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
