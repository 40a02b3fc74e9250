//! Core ledger primitives for petchain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - Hashing of structured records (blake3)
//! - Keys, owner fingerprints and ownership claims (ed25519)
//! - Pet profiles and event details
//! - Transactions
//! - Blocks and their merkle roots

pub mod block;
pub mod crypto;
pub mod hash;
pub mod merkle;
pub mod pet;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{seal_hash, timestamp_millis, Block};
pub use crypto::{fingerprint, verify_claim, CryptoError, Fingerprint, Keypair, PublicKey, Signature};
pub use hash::{hash, hash_concat, hash_record, Hash, H256};
pub use merkle::merkle_root;
pub use pet::{
    FoundReport, LostReport, PetId, PetProfile, PetStatus, TransferOrder, VetEntry, REWARD_PET_ID,
};
pub use transaction::{Claim, MiningReward, Payload, Transaction, TransactionError, TxKind};
