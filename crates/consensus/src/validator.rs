//! Block and chain validation rules.
//!
//! A block is accepted only if its stored hash matches its contents, the hash
//! meets the difficulty, and it links to its predecessor by hash and index. A
//! chain is accepted only if it starts at the fixed genesis and every later
//! block passes those checks.

use crate::pow::MINING_REWARD;
use petchain_core::{Block, Hash, Payload, Transaction};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block {index}: stored hash does not match contents")]
    HashMismatch { index: u64 },

    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    DifficultyNotMet { index: u64, difficulty: u32 },

    #[error("block {index}: previous_hash does not match predecessor")]
    PreviousHashMismatch { index: u64 },

    #[error("block index mismatch (expected {expected}, got {got})")]
    IndexMismatch { expected: u64, got: u64 },

    #[error("chain does not start with the genesis block")]
    InvalidGenesis,

    #[error("chain is empty")]
    EmptyChain,

    #[error("block {index}: expected exactly one reward as the last transaction")]
    MisplacedReward { index: u64 },

    #[error("block {index}: reward amount {amount} does not match the fixed reward")]
    InvalidReward { index: u64, amount: u64 },

    #[error("block {index}: duplicate transaction")]
    DuplicateTransaction { index: u64 },

    #[error("block {index}: transaction {tx_hash} is already confirmed")]
    ReplayedTransaction { index: u64, tx_hash: Hash },

    #[error("block {index}: invalid transaction: {reason}")]
    InvalidTransaction { index: u64, reason: String },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// Verify a block against its predecessor.
    ///
    /// Checks, in order: the stored hash equals the recomputed hash, the hash
    /// meets `difficulty`, `previous_hash` links to `previous`, and the index
    /// follows `previous.index`.
    pub fn verify(block: &Block, previous: &Block, difficulty: u32) -> Result<()> {
        if !block.has_consistent_hash() {
            return Err(ValidationError::HashMismatch { index: block.index });
        }

        if !block.hash.meets_difficulty(difficulty) {
            return Err(ValidationError::DifficultyNotMet {
                index: block.index,
                difficulty,
            });
        }

        if block.previous_hash != previous.hash {
            return Err(ValidationError::PreviousHashMismatch { index: block.index });
        }

        if block.index != previous.index + 1 {
            return Err(ValidationError::IndexMismatch {
                expected: previous.index + 1,
                got: block.index,
            });
        }

        Ok(())
    }

    /// Validate the transactions carried by a mined block.
    ///
    /// Every pet transaction must satisfy its schema and carry a valid claim;
    /// the block must end with exactly one reward of the fixed amount; no
    /// transaction may appear twice.
    pub fn validate_transactions(block: &Block) -> Result<()> {
        let index = block.index;

        let rewards = block.transactions.iter().filter(|tx| tx.is_reward()).count();
        let last_is_reward = block
            .transactions
            .last()
            .map(Transaction::is_reward)
            .unwrap_or(false);
        if rewards != 1 || !last_is_reward {
            return Err(ValidationError::MisplacedReward { index });
        }

        let mut seen = HashSet::new();
        for tx in &block.transactions {
            if !seen.insert(tx.hash()) {
                return Err(ValidationError::DuplicateTransaction { index });
            }

            tx.validate()
                .map_err(|e| ValidationError::InvalidTransaction {
                    index,
                    reason: e.to_string(),
                })?;

            match &tx.payload {
                Payload::Reward(reward) if reward.amount != MINING_REWARD => {
                    return Err(ValidationError::InvalidReward {
                        index,
                        amount: reward.amount,
                    });
                }
                Payload::Reward(_) => {}
                _ => {
                    tx.verify_signature()
                        .map_err(|e| ValidationError::InvalidTransaction {
                            index,
                            reason: e.to_string(),
                        })?;
                }
            }
        }

        Ok(())
    }

    /// Reject a block carrying a pet transaction already confirmed earlier in
    /// the chain. Rewards are exempt.
    pub fn check_replays(block: &Block, confirmed: &HashSet<Hash>) -> Result<()> {
        for tx in block.transactions.iter().filter(|tx| !tx.is_reward()) {
            let tx_hash = tx.hash();
            if confirmed.contains(&tx_hash) {
                return Err(ValidationError::ReplayedTransaction {
                    index: block.index,
                    tx_hash,
                });
            }
        }
        Ok(())
    }

    /// Full validation of a mined block against its predecessor.
    pub fn validate_full(block: &Block, previous: &Block, difficulty: u32) -> Result<()> {
        Self::verify(block, previous, difficulty)?;
        Self::validate_transactions(block)?;
        Ok(())
    }
}

/// Chain validator.
pub struct ChainValidator;

impl ChainValidator {
    /// Walk a chain from genesis, validating every block.
    ///
    /// A pet transaction may appear at most once in the whole chain.
    pub fn validate(chain: &[Block], difficulty: u32) -> Result<()> {
        let genesis = chain.first().ok_or(ValidationError::EmptyChain)?;
        if *genesis != Block::genesis() {
            return Err(ValidationError::InvalidGenesis);
        }

        let mut confirmed: HashSet<Hash> = genesis.transactions.iter().map(Transaction::hash).collect();
        for pair in chain.windows(2) {
            let block = &pair[1];
            BlockValidator::validate_full(block, &pair[0], difficulty)?;
            BlockValidator::check_replays(block, &confirmed)?;
            confirmed.extend(
                block
                    .transactions
                    .iter()
                    .filter(|tx| !tx.is_reward())
                    .map(Transaction::hash),
            );
        }

        Ok(())
    }

    pub fn is_valid_chain(chain: &[Block], difficulty: u32) -> bool {
        Self::validate(chain, difficulty).is_ok()
    }
}
