//! Proof of Work sealing.
//!
//! A block is sealed by searching for a nonce that gives its hash the
//! configured number of leading zero hex characters. Difficulty is a static
//! operator setting; there is no retargeting.

use petchain_core::{seal_hash, timestamp_millis, Block, Hash};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Amount credited to the miner of each block.
pub const MINING_REWARD: u64 = 1;

/// Largest meaningful difficulty: a blake3 hash has 64 hex characters.
pub const MAX_DIFFICULTY: u32 = 64;

/// Errors that can occur while sealing a block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("difficulty {0} exceeds the maximum of 64")]
    DifficultyTooHigh(u32),
}

pub type Result<T> = std::result::Result<T, PowError>;

/// Shared flag used to abort mining between nonce attempts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Proof of Work sealer for a fixed difficulty.
#[derive(Debug, Clone, Copy)]
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(PowError::DifficultyTooHigh(difficulty));
        }
        Ok(Self { difficulty })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Check whether a hash satisfies this difficulty.
    pub fn is_satisfied(&self, hash: &Hash) -> bool {
        hash.meets_difficulty(self.difficulty)
    }

    /// Seal a block, running until the target is met.
    pub fn seal(&self, block: Block) -> Result<Block> {
        self.seal_with(block, || false)
    }

    /// Seal a block, polling `cancelled` before every nonce attempt.
    ///
    /// On cancellation the candidate is dropped; no partially sealed block
    /// escapes.
    pub fn seal_with<F>(&self, mut block: Block, cancelled: F) -> Result<Block>
    where
        F: Fn() -> bool,
    {
        let merkle_root = block.merkle_root();
        let mut nonce: u64 = 0;
        let mut attempts: u64 = 0;

        loop {
            if cancelled() {
                return Err(PowError::Cancelled { attempts });
            }

            let hash = seal_hash(
                block.index,
                block.timestamp,
                &merkle_root,
                &block.previous_hash,
                nonce,
            );
            attempts += 1;

            if self.is_satisfied(&hash) {
                block.nonce = nonce;
                block.hash = hash;
                return Ok(block);
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => {
                    // Nonce space exhausted: move the timestamp and start over.
                    block.timestamp = timestamp_millis().max(block.timestamp + 1);
                    0
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn candidate() -> Block {
        Block::candidate(1, Block::genesis().hash, vec![])
    }

    #[test]
    fn test_zero_difficulty_first_attempt() {
        let pow = ProofOfWork::new(0).unwrap();
        let sealed = pow.seal(candidate()).unwrap();

        assert_eq!(sealed.nonce, 0);
        assert!(sealed.has_consistent_hash());
    }

    #[test]
    fn test_sealed_block_meets_difficulty() {
        for difficulty in 1..=3 {
            let pow = ProofOfWork::new(difficulty).unwrap();
            let sealed = pow.seal(candidate()).unwrap();

            assert!(sealed.hash.leading_zero_chars() >= difficulty as usize);
            assert!(sealed.has_consistent_hash());
        }
    }

    #[test]
    fn test_difficulty_too_high_rejected() {
        assert_eq!(
            ProofOfWork::new(65).unwrap_err(),
            PowError::DifficultyTooHigh(65)
        );
    }

    #[test]
    fn test_cancel_before_first_attempt() {
        let pow = ProofOfWork::new(4).unwrap();
        let token = CancelToken::new();
        token.cancel();

        let result = pow.seal_with(candidate(), || token.is_cancelled());
        assert_eq!(result, Err(PowError::Cancelled { attempts: 0 }));
    }

    #[test]
    fn test_cancel_mid_search() {
        // Unreachable target; cancel after a few attempts.
        let pow = ProofOfWork::new(MAX_DIFFICULTY).unwrap();
        let polls = Cell::new(0u64);

        let result = pow.seal_with(candidate(), || {
            polls.set(polls.get() + 1);
            polls.get() > 10
        });
        assert_eq!(result, Err(PowError::Cancelled { attempts: 10 }));
    }

    #[test]
    fn test_cancel_token_reset() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}
