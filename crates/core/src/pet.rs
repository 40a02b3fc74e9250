//! Pet domain types carried by transactions and the registry.

use crate::crypto::Fingerprint;
use crate::hash::hash_concat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier reserved for mining reward transactions. Never names a pet.
pub const REWARD_PET_ID: &str = "BLOCKCHAIN_REWARD";

/// Identifier of a pet on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PetId(pub String);

impl PetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a fresh id: first 8 bytes of blake3(microchip | owner | timestamp) as hex.
    pub fn generate(microchip_id: &str, owner: &Fingerprint, timestamp: u64) -> Self {
        let digest = hash_concat(&[
            microchip_id.as_bytes(),
            b"_",
            owner.as_bytes(),
            b"_",
            &timestamp.to_be_bytes(),
        ]);
        Self(hex::encode(&digest.0[..8]))
    }

    /// The sentinel id carried by reward transactions.
    pub fn reward() -> Self {
        Self(REWARD_PET_ID.to_string())
    }

    pub fn is_reward(&self) -> bool {
        self.0 == REWARD_PET_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Current status of a registered pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetStatus {
    Active,
    Lost,
    Found,
}

impl fmt::Display for PetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PetStatus::Active => "active",
            PetStatus::Lost => "lost",
            PetStatus::Found => "found",
        };
        f.write_str(s)
    }
}

/// Profile fields supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetProfile {
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub microchip_id: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    pub owner_name: String,
    pub owner_phone: String,
    #[serde(default)]
    pub owner_email: Option<String>,
}

impl PetProfile {
    /// A profile with only the required fields set. Species defaults to "dog".
    pub fn new(
        name: impl Into<String>,
        owner_name: impl Into<String>,
        owner_phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            species: "dog".to_string(),
            breed: None,
            microchip_id: None,
            birth_date: None,
            color: None,
            weight: None,
            owner_name: owner_name.into(),
            owner_phone: owner_phone.into(),
            owner_email: None,
        }
    }

    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.species = species.into();
        self
    }

    pub fn with_breed(mut self, breed: impl Into<String>) -> Self {
        self.breed = Some(breed.into());
        self
    }

    pub fn with_microchip(mut self, microchip_id: impl Into<String>) -> Self {
        self.microchip_id = Some(microchip_id.into());
        self
    }

    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.weight = Some(weight.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.owner_email = Some(email.into());
        self
    }
}

/// A veterinary record entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VetEntry {
    pub record_type: String,
    pub vet_name: String,
    pub procedure: String,
    #[serde(default)]
    pub vet_clinic: Option<String>,
    #[serde(default)]
    pub vet_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub next_due_date: Option<String>,
}

impl VetEntry {
    pub fn new(
        record_type: impl Into<String>,
        vet_name: impl Into<String>,
        procedure: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            vet_name: vet_name.into(),
            procedure: procedure.into(),
            vet_clinic: None,
            vet_phone: None,
            notes: None,
            date: None,
            next_due_date: None,
        }
    }
}

/// Details attached to a lost report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LostReport {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Details attached to a found report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundReport {
    pub finder_contact: String,
}

/// Ownership handover to a new key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub new_owner: Fingerprint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_16_hex_chars() {
        let id = PetId::generate("985112004", &Fingerprint::default(), 42);
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_id_varies_with_timestamp() {
        let fp = Fingerprint::default();
        assert_ne!(PetId::generate("chip", &fp, 1), PetId::generate("chip", &fp, 2));
    }

    #[test]
    fn test_reward_sentinel() {
        assert!(PetId::reward().is_reward());
        assert!(!PetId::from("P1").is_reward());
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(serde_json::to_string(&PetStatus::Lost).unwrap(), "\"lost\"");
    }

    #[test]
    fn test_profile_builder_defaults() {
        let profile = PetProfile::new("Max", "Ann", "555-0100").with_breed("Beagle");
        assert_eq!(profile.species, "dog");
        assert_eq!(profile.breed.as_deref(), Some("Beagle"));
        assert!(profile.microchip_id.is_none());
        assert!(profile.weight.is_none());
    }

    #[test]
    fn test_optional_contact_fields_default_when_absent() {
        let profile: PetProfile = serde_json::from_str(
            r#"{"name":"Max","species":"cat","owner_name":"Ann","owner_phone":"555"}"#,
        )
        .unwrap();
        assert!(profile.weight.is_none());

        let entry: VetEntry = serde_json::from_str(
            r#"{"record_type":"vaccination","vet_name":"Dr. Lee","procedure":"rabies"}"#,
        )
        .unwrap();
        assert!(entry.vet_phone.is_none());
    }

    #[test]
    fn test_weight_and_vet_phone_serialized() {
        let profile = PetProfile::new("Max", "Ann", "555").with_weight("12kg");
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["weight"], "12kg");

        let mut entry = VetEntry::new("checkup", "Dr. Lee", "annual exam");
        entry.vet_phone = Some("555-0199".into());
        let back: VetEntry =
            serde_json::from_str(&serde_json::to_string(&entry).unwrap()).unwrap();
        assert_eq!(back.vet_phone.as_deref(), Some("555-0199"));
    }
}
