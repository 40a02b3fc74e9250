//! Proof of Work consensus for petchain.
//!
//! This crate provides:
//! - Proof of Work sealing with a static difficulty and a cancellation hook
//! - Block validation (hash, difficulty, linkage, index, transactions)
//! - Chain validation from the fixed genesis block
//!
//! # Example
//!
//! ```rust,no_run
//! use petchain_consensus::{ChainValidator, ProofOfWork, MINING_REWARD};
//! use petchain_core::{Block, Transaction};
//!
//! let genesis = Block::genesis();
//! let reward = Transaction::reward("node-1", MINING_REWARD).unwrap();
//! let candidate = Block::candidate(1, genesis.hash, vec![reward]);
//!
//! let pow = ProofOfWork::new(2).unwrap();
//! let sealed = pow.seal(candidate).unwrap();
//!
//! assert!(ChainValidator::is_valid_chain(&[genesis, sealed], 2));
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{CancelToken, PowError, ProofOfWork, MAX_DIFFICULTY, MINING_REWARD};
pub use validator::{BlockValidator, ChainValidator, ValidationError};
