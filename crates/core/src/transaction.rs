//! Ledger transactions: one tagged payload per event kind.

use crate::block::timestamp_millis;
use crate::crypto::{Fingerprint, Keypair, PublicKey, Signature};
use crate::hash::{hash_record, Hash};
use crate::pet::{FoundReport, LostReport, PetId, PetProfile, TransferOrder, VetEntry};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("missing owner claim")]
    MissingClaim,
    #[error("claim signature verification failed")]
    VerificationFailed,
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// The kind of event a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Register,
    VetRecord,
    ReportLost,
    ReportFound,
    Transfer,
    Reward,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxKind::Register => "register",
            TxKind::VetRecord => "vet_record",
            TxKind::ReportLost => "report_lost",
            TxKind::ReportFound => "report_found",
            TxKind::Transfer => "transfer",
            TxKind::Reward => "reward",
        };
        f.write_str(s)
    }
}

/// Synthetic credit to the node that mined a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningReward {
    pub miner: String,
    pub amount: u64,
}

/// Kind-specific transaction data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Register(PetProfile),
    VetRecord(VetEntry),
    ReportLost(LostReport),
    ReportFound(FoundReport),
    Transfer(TransferOrder),
    Reward(MiningReward),
}

impl Payload {
    pub fn kind(&self) -> TxKind {
        match self {
            Payload::Register(_) => TxKind::Register,
            Payload::VetRecord(_) => TxKind::VetRecord,
            Payload::ReportLost(_) => TxKind::ReportLost,
            Payload::ReportFound(_) => TxKind::ReportFound,
            Payload::Transfer(_) => TxKind::Transfer,
            Payload::Reward(_) => TxKind::Reward,
        }
    }
}

/// Proof that the author holds a key: the public key and its signature over
/// the transaction's signing hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// A transaction on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Pet this event concerns.
    pub pet_id: PetId,
    /// Owner fingerprint: the new owner for `Register`, the current owner otherwise.
    pub owner: Fingerprint,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    pub payload: Payload,
    /// Author's claim. `None` only for reward transactions.
    pub claim: Option<Claim>,
}

/// Unsigned transaction data (for hashing and signing).
#[derive(Serialize)]
struct UnsignedTransaction<'a> {
    pet_id: &'a PetId,
    owner: &'a Fingerprint,
    timestamp: u64,
    payload: &'a Payload,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TransactionError::InvalidTransaction(format!(
            "missing required field `{}`",
            field
        )));
    }
    Ok(())
}

impl Transaction {
    fn build(pet_id: PetId, owner: Fingerprint, payload: Payload) -> Result<Self> {
        let tx = Self {
            pet_id,
            owner,
            timestamp: timestamp_millis(),
            payload,
            claim: None,
        };
        tx.validate()?;
        Ok(tx)
    }

    /// Register a new pet owned by `owner`.
    pub fn register(pet_id: PetId, owner: Fingerprint, profile: PetProfile) -> Result<Self> {
        Self::build(pet_id, owner, Payload::Register(profile))
    }

    /// Append a veterinary record.
    pub fn vet_record(pet_id: PetId, owner: Fingerprint, entry: VetEntry) -> Result<Self> {
        Self::build(pet_id, owner, Payload::VetRecord(entry))
    }

    /// Mark a pet as lost.
    pub fn report_lost(pet_id: PetId, owner: Fingerprint, report: LostReport) -> Result<Self> {
        Self::build(pet_id, owner, Payload::ReportLost(report))
    }

    /// Report a lost pet as found. `owner` is the registered owner's
    /// fingerprint; the claim is made by the finder.
    pub fn report_found(pet_id: PetId, owner: Fingerprint, report: FoundReport) -> Result<Self> {
        Self::build(pet_id, owner, Payload::ReportFound(report))
    }

    /// Hand ownership to `new_owner`.
    pub fn transfer(pet_id: PetId, owner: Fingerprint, new_owner: Fingerprint) -> Result<Self> {
        Self::build(pet_id, owner, Payload::Transfer(TransferOrder { new_owner }))
    }

    /// Mining reward crediting `miner`.
    pub fn reward(miner: impl Into<String>, amount: u64) -> Result<Self> {
        Self::build(
            PetId::reward(),
            Fingerprint::default(),
            Payload::Reward(MiningReward {
                miner: miner.into(),
                amount,
            }),
        )
    }

    /// Override the timestamp. Only meaningful before signing.
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check the required-field schema of the payload.
    ///
    /// Constructors call this; transactions arriving over the wire must be
    /// re-checked because they bypass the constructors.
    pub fn validate(&self) -> Result<()> {
        if self.payload.kind() == TxKind::Reward {
            if !self.pet_id.is_reward() {
                return Err(TransactionError::InvalidTransaction(
                    "reward transaction must use the reward id".into(),
                ));
            }
        } else {
            require("pet_id", self.pet_id.as_str())?;
            if self.pet_id.is_reward() {
                return Err(TransactionError::InvalidTransaction(format!(
                    "pet id `{}` is reserved",
                    self.pet_id
                )));
            }
        }

        match &self.payload {
            Payload::Register(profile) => {
                require("name", &profile.name)?;
                require("species", &profile.species)?;
                require("owner_name", &profile.owner_name)?;
                require("owner_phone", &profile.owner_phone)?;
            }
            Payload::VetRecord(entry) => {
                require("record_type", &entry.record_type)?;
                require("vet_name", &entry.vet_name)?;
                require("procedure", &entry.procedure)?;
            }
            Payload::ReportLost(_) => {}
            Payload::ReportFound(report) => {
                require("finder_contact", &report.finder_contact)?;
            }
            Payload::Transfer(order) => {
                if order.new_owner == self.owner {
                    return Err(TransactionError::InvalidTransaction(
                        "transfer to the current owner".into(),
                    ));
                }
            }
            Payload::Reward(reward) => {
                require("miner", &reward.miner)?;
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> TxKind {
        self.payload.kind()
    }

    pub fn is_reward(&self) -> bool {
        self.kind() == TxKind::Reward
    }

    /// Get the hash of the unsigned transaction (for signing).
    pub fn signing_hash(&self) -> Hash {
        hash_record(&UnsignedTransaction {
            pet_id: &self.pet_id,
            owner: &self.owner,
            timestamp: self.timestamp,
            payload: &self.payload,
        })
    }

    /// Get the full transaction hash (including the claim). This is the
    /// transaction's identity.
    pub fn hash(&self) -> Hash {
        hash_record(self)
    }

    /// Sign the transaction with the given keypair.
    pub fn sign(&mut self, keypair: &Keypair) {
        let hash = self.signing_hash();
        self.claim = Some(Claim {
            public_key: keypair.public_key.clone(),
            signature: keypair.sign_hash(&hash),
        });
    }

    /// Create a signed transaction.
    pub fn signed(mut self, keypair: &Keypair) -> Self {
        self.sign(keypair);
        self
    }

    /// Verify the claim signature and return the claimant's key.
    pub fn verify_signature(&self) -> Result<&PublicKey> {
        let claim = self.claim.as_ref().ok_or(TransactionError::MissingClaim)?;
        let hash = self.signing_hash();
        claim
            .public_key
            .verify(hash.as_bytes(), &claim.signature)
            .map_err(|_| TransactionError::VerificationFailed)?;
        Ok(&claim.public_key)
    }

    /// Fingerprint of the key that made the claim, if any.
    pub fn claimant(&self) -> Option<Fingerprint> {
        self.claim.as_ref().map(|c| c.public_key.fingerprint())
    }
}
