//! In-memory card catalog with additive merge and JSON checkpoints.
//!
//! The [`Catalog`] is the aggregate the pipeline builds: records keyed by
//! identity, in insertion order, plus the derived sets discovery uses to skip
//! known work.
//!
//! **Access rules:**
//! - exactly one task owns and mutates a `Catalog` at a time
//! - other stages only ever see a [`Known`] snapshot

mod checkpoint;

use std::collections::{HashMap, HashSet};

use gatherbox_shared::{ExternalId, GatherError, Printing, Record, Result};

/// Result of [`Catalog::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The identity was new; the record was appended.
    Inserted,
    /// The identity existed and something was added or filled in.
    Merged {
        /// Printings appended to the existing record.
        new_printings: usize,
        /// Existing printings (and the record itself) whose empty fields
        /// were filled.
        updated: usize,
    },
    /// The identity existed and the record carried nothing new.
    Unchanged,
}

/// Point-in-time copy of the derived lookup sets.
#[derive(Debug, Clone, Default)]
pub struct Known {
    pub identities: HashSet<String>,
    pub external_ids: HashSet<ExternalId>,
}

/// Ordered, identity-keyed collection of records.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<Record>,
    /// identity -> position in `records`
    index: HashMap<String, usize>,
    external_ids: HashSet<ExternalId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` or merge it into the record sharing its identity.
    ///
    /// Merging is additive: unseen printings are appended, known printings
    /// only have their empty fields filled, and record-level fields are
    /// filled the same way. Existing non-empty data is never replaced, so
    /// adding the same record twice leaves the catalog as after the first.
    pub fn add(&mut self, record: Record) -> Result<AddOutcome> {
        if record.editions.is_empty() {
            return Err(GatherError::invalid_record(&record.name, "no printings"));
        }
        if record.name.trim().is_empty() {
            return Err(GatherError::invalid_record(&record.name, "empty name"));
        }
        if record.id.is_empty() {
            return Err(GatherError::invalid_record(&record.name, "missing identity"));
        }

        match self.index.get(&record.id) {
            Some(&pos) => Ok(self.merge_into(pos, &record)),
            None => {
                let mut incoming = record;
                let printings = std::mem::take(&mut incoming.editions);
                for printing in &printings {
                    merge_printing(&mut incoming.editions, printing);
                }
                self.external_ids
                    .extend(incoming.editions.iter().map(|p| p.multiverse_id));
                self.index.insert(incoming.id.clone(), self.records.len());
                self.records.push(incoming);
                Ok(AddOutcome::Inserted)
            }
        }
    }

    fn merge_into(&mut self, pos: usize, incoming: &Record) -> AddOutcome {
        let existing = &mut self.records[pos];
        let mut new_printings = 0;
        let mut updated = usize::from(existing.fill_from(incoming));

        for printing in &incoming.editions {
            match merge_printing(&mut existing.editions, printing) {
                PrintingChange::Appended => {
                    self.external_ids.insert(printing.multiverse_id);
                    new_printings += 1;
                }
                PrintingChange::Filled => updated += 1,
                PrintingChange::None => {}
            }
        }

        if new_printings == 0 && updated == 0 {
            AddOutcome::Unchanged
        } else {
            AddOutcome::Merged {
                new_printings,
                updated,
            }
        }
    }

    pub fn contains_identity(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    pub fn contains_external_id(&self, id: ExternalId) -> bool {
        self.external_ids.contains(&id)
    }

    /// Every known identity.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }

    /// Every printing id across all records.
    pub fn external_ids(&self) -> &HashSet<ExternalId> {
        &self.external_ids
    }

    /// Copy of the derived sets, for stages that must not hold the catalog.
    pub fn known(&self) -> Known {
        Known {
            identities: self.index.keys().cloned().collect(),
            external_ids: self.external_ids.clone(),
        }
    }

    pub fn get(&self, identity: &str) -> Option<&Record> {
        self.index.get(identity).map(|&pos| &self.records[pos])
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total printings across all records.
    pub fn printing_count(&self) -> usize {
        self.records.iter().map(|r| r.editions.len()).sum()
    }

    /// Ids of printings whose descriptive fields are still unknown, sorted.
    pub fn incomplete_printings(&self) -> Vec<ExternalId> {
        let mut ids: Vec<ExternalId> = self
            .records
            .iter()
            .flat_map(|r| r.editions.iter())
            .filter(|p| p.is_incomplete())
            .map(|p| p.multiverse_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

enum PrintingChange {
    Appended,
    Filled,
    None,
}

fn merge_printing(printings: &mut Vec<Printing>, incoming: &Printing) -> PrintingChange {
    match printings
        .iter_mut()
        .find(|p| p.multiverse_id == incoming.multiverse_id)
    {
        Some(existing) => {
            if existing.fill_from(incoming) {
                PrintingChange::Filled
            } else {
                PrintingChange::None
            }
        }
        None => {
            printings.push(incoming.clone());
            PrintingChange::Appended
        }
    }
}
