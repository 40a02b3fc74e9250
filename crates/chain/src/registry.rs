//! Current per-pet state derived by replaying confirmed transactions.
//!
//! The registry is never edited directly. It changes only when a block is
//! applied, and [`Registry::rebuild`] from the same chain always yields the
//! same registry.

use crate::error::{LedgerError, Result};
use petchain_core::{
    verify_claim, Block, Fingerprint, FoundReport, LostReport, Payload, PetId, PetProfile,
    PetStatus, Transaction, VetEntry,
};
use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap};
use tracing::warn;

/// Details of the open lost report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostStatus {
    #[serde(flatten)]
    pub report: LostReport,
    /// Timestamp of the confirming transaction.
    pub since: u64,
}

/// Details of the last found report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundStatus {
    #[serde(flatten)]
    pub report: FoundReport,
    /// Key that reported the pet found.
    pub finder: Option<Fingerprint>,
    pub at: u64,
}

/// Registry entry for one pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetRecord {
    pub pet_id: PetId,
    pub profile: PetProfile,
    pub owner: Fingerprint,
    pub status: PetStatus,
    pub vet_history: Vec<VetEntry>,
    /// Timestamp of the registering transaction.
    pub registered_at: u64,
    /// Index of the block holding the latest applied event.
    pub last_event_block: u64,
    pub lost: Option<LostStatus>,
    pub found: Option<FoundStatus>,
}

/// Criteria for [`Registry::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    needle: String,
    lost_only: bool,
}

impl SearchQuery {
    /// Case-insensitive substring query. An empty query matches every pet.
    pub fn new(text: &str) -> Self {
        Self {
            needle: text.trim().to_lowercase(),
            lost_only: false,
        }
    }

    /// Restrict results to pets currently reported lost.
    pub fn lost_only(mut self, lost_only: bool) -> Self {
        self.lost_only = lost_only;
        self
    }

    pub fn matches(&self, record: &PetRecord) -> bool {
        if self.lost_only && record.status != PetStatus::Lost {
            return false;
        }
        if self.needle.is_empty() {
            return true;
        }

        let profile = &record.profile;
        [
            Some(profile.name.as_str()),
            profile.breed.as_deref(),
            profile.microchip_id.as_deref(),
            Some(record.pet_id.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&self.needle))
    }
}

/// Lazy search over the registry in pet id order.
#[derive(Clone)]
pub struct Search<'a> {
    records: btree_map::Values<'a, PetId, PetRecord>,
    query: &'a SearchQuery,
}

impl<'a> Iterator for Search<'a> {
    type Item = &'a PetRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let query = self.query;
        self.records.find(|record| query.matches(record))
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total_pets: usize,
    pub active_pets: usize,
    pub lost_pets: usize,
    pub found_pets: usize,
    pub vet_records: usize,
}

/// Per-pet state, keyed and ordered by pet id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    pets: BTreeMap<PetId, PetRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pets.is_empty()
    }

    pub fn contains(&self, pet_id: &PetId) -> bool {
        self.pets.contains_key(pet_id)
    }

    pub fn get(&self, pet_id: &PetId) -> Result<&PetRecord> {
        self.pets
            .get(pet_id)
            .ok_or_else(|| LedgerError::NotFound(format!("pet {}", pet_id)))
    }

    /// Apply a confirmed block's transactions in order.
    ///
    /// A transaction that does not fit the current state (duplicate
    /// registration, wrong owner, found report for a pet that is not lost)
    /// is skipped with a warning. The first confirmed event wins.
    pub fn apply(&mut self, block: &Block) {
        for tx in &block.transactions {
            if let Err(reason) = self.apply_transaction(tx, block.index) {
                warn!(
                    block = block.index,
                    pet_id = %tx.pet_id,
                    kind = %tx.kind(),
                    "skipping transaction: {}",
                    reason
                );
            }
        }
    }

    /// Clear the registry and replay `chain` from genesis.
    pub fn rebuild(&mut self, chain: &[Block]) {
        self.pets.clear();
        for block in chain {
            self.apply(block);
        }
    }

    /// Pets matching `query`, ordered by pet id.
    pub fn search<'a>(&'a self, query: &'a SearchQuery) -> Search<'a> {
        Search {
            records: self.pets.values(),
            query,
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total_pets: self.pets.len(),
            ..RegistryStats::default()
        };
        for record in self.pets.values() {
            match record.status {
                PetStatus::Active => stats.active_pets += 1,
                PetStatus::Lost => stats.lost_pets += 1,
                PetStatus::Found => stats.found_pets += 1,
            }
            stats.vet_records += record.vet_history.len();
        }
        stats
    }

    fn apply_transaction(&mut self, tx: &Transaction, block_index: u64) -> std::result::Result<(), String> {
        if let Payload::Register(profile) = &tx.payload {
            if self.pets.contains_key(&tx.pet_id) {
                return Err("pet already registered".into());
            }
            self.pets.insert(
                tx.pet_id.clone(),
                PetRecord {
                    pet_id: tx.pet_id.clone(),
                    profile: profile.clone(),
                    owner: tx.owner,
                    status: PetStatus::Active,
                    vet_history: Vec::new(),
                    registered_at: tx.timestamp,
                    last_event_block: block_index,
                    lost: None,
                    found: None,
                },
            );
            return Ok(());
        }

        if tx.is_reward() {
            return Ok(());
        }

        let record = self
            .pets
            .get_mut(&tx.pet_id)
            .ok_or_else(|| "unknown pet".to_string())?;
        if tx.owner != record.owner {
            return Err("owner does not match the registered owner".into());
        }

        match &tx.payload {
            Payload::ReportFound(report) => {
                if record.status != PetStatus::Lost {
                    return Err("pet is not reported lost".into());
                }
                record.status = PetStatus::Found;
                record.found = Some(FoundStatus {
                    report: report.clone(),
                    finder: tx.claimant(),
                    at: tx.timestamp,
                });
            }
            payload => {
                let authorized = tx
                    .claim
                    .as_ref()
                    .map(|claim| verify_claim(&record.owner, &claim.public_key))
                    .unwrap_or(false);
                if !authorized {
                    return Err("claim was not made by the owner".into());
                }

                match payload {
                    Payload::VetRecord(entry) => record.vet_history.push(entry.clone()),
                    Payload::ReportLost(report) => {
                        record.status = PetStatus::Lost;
                        record.lost = Some(LostStatus {
                            report: report.clone(),
                            since: tx.timestamp,
                        });
                    }
                    Payload::Transfer(order) => record.owner = order.new_owner,
                    Payload::Register(_) | Payload::ReportFound(_) | Payload::Reward(_) => {}
                }
            }
        }

        record.last_event_block = block_index;
        Ok(())
    }
}
