//! Errors surfaced by ledger and node operations.

use petchain_consensus::{PowError, ValidationError};
use petchain_core::TransactionError;
use petchain_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// Every variant is recoverable: a rejected operation leaves the ledger and
/// the registry as they were.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("no pending transactions to mine")]
    NothingToMine,

    #[error("invalid block: {0}")]
    InvalidBlock(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transaction already known")]
    DuplicateTransaction,

    #[error("chain tip moved while mining; block discarded")]
    StaleTip,

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("invalid node address: {0}")]
    InvalidNodeAddress(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("node state lock poisoned")]
    LockPoisoned,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<TransactionError> for LedgerError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::InvalidTransaction(reason) => LedgerError::InvalidTransaction(reason),
            TransactionError::MissingClaim | TransactionError::VerificationFailed => {
                LedgerError::Unauthorized(err.to_string())
            }
        }
    }
}

impl From<PowError> for LedgerError {
    fn from(err: PowError) -> Self {
        match err {
            PowError::Cancelled { .. } => LedgerError::MiningCancelled,
            PowError::DifficultyTooHigh(_) => LedgerError::Config(err.to_string()),
        }
    }
}
