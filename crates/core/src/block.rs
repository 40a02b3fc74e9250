//! Hash-linked blocks of transactions.

use crate::hash::{hash_record, Hash};
use crate::merkle::merkle_root;
use crate::pet::PetId;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// The fields covered by the block hash. Transactions enter through their
/// merkle root, so the hash commits to every transaction in order.
#[derive(Serialize)]
struct SealHeader<'a> {
    index: u64,
    timestamp: u64,
    merkle_root: &'a Hash,
    previous_hash: &'a Hash,
    nonce: u64,
}

/// Hash of a block given its merkle root.
///
/// Exposed so miners can vary the nonce without recomputing the merkle root.
pub fn seal_hash(
    index: u64,
    timestamp: u64,
    merkle_root: &Hash,
    previous_hash: &Hash,
    nonce: u64,
) -> Hash {
    hash_record(&SealHeader {
        index,
        timestamp,
        merkle_root,
        previous_hash,
        nonce,
    })
}

/// A block: an ordered container of transactions sealed by proof-of-work.
///
/// Every field needed to re-verify the block is stored in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 for genesis).
    pub index: u64,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block, `Hash::ZERO` for genesis.
    pub previous_hash: Hash,
    pub nonce: u64,
    /// Stored seal. Equal to [`Block::compute_hash`] for an untampered block.
    pub hash: Hash,
}

impl Block {
    /// Create an unsealed candidate block extending `previous_hash`.
    pub fn candidate(index: u64, previous_hash: Hash, transactions: Vec<Transaction>) -> Self {
        let mut block = Self {
            index,
            timestamp: timestamp_millis(),
            transactions,
            previous_hash,
            nonce: 0,
            hash: Hash::ZERO,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The fixed genesis block shared by every node.
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            timestamp: 0,
            transactions: Vec::new(),
            previous_hash: Hash::ZERO,
            nonce: 0,
            hash: Hash::ZERO,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Merkle root of the block's transactions.
    pub fn merkle_root(&self) -> Hash {
        let tx_hashes: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash()).collect();
        merkle_root(&tx_hashes)
    }

    /// Recompute the hash from the block's contents.
    pub fn compute_hash(&self) -> Hash {
        seal_hash(
            self.index,
            self.timestamp,
            &self.merkle_root(),
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Check the stored hash against the recomputed one.
    pub fn has_consistent_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == Hash::ZERO
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Transactions in this block concerning `pet_id`, in block order.
    pub fn transactions_for<'a>(
        &'a self,
        pet_id: &'a PetId,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.transactions.iter().filter(move |tx| &tx.pet_id == pet_id)
    }
}
