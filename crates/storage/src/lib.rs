//! Persistent storage layer for petchain.
//!
//! This crate keeps the chain on disk so a node survives restarts:
//! - Blocks keyed by index (`block:height:{n}`)
//! - The index of the current tip (`chain:height`)
//! - Atomic whole-chain replacement after fork resolution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! │              (Ledger, NodeState, CLI)                    │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                   Storage Layer                          │
//! │        ┌─────────────┐     ┌─────────────────┐          │
//! │        │ ChainStore  │     │ Storage (DB)    │          │
//! │        │  - Blocks   │     │  - sled wrapper │          │
//! │        │  - Height   │     │  - serialization│          │
//! │        │  - Replace  │     │  - key helpers  │          │
//! │        └─────────────┘     └─────────────────┘          │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                    sled Database                         │
//! │              (Embedded Key-Value Store)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use petchain_core::Block;
//! use petchain_storage::{ChainStore, Storage};
//!
//! let storage = Storage::open("./petchain_data").unwrap();
//! let chain = ChainStore::new(&storage);
//! if !chain.is_initialized().unwrap() {
//!     chain.init_genesis(&Block::genesis()).unwrap();
//! }
//! let blocks = chain.load_chain().unwrap();
//! assert_eq!(blocks[0], Block::genesis());
//! ```

pub mod chain;
pub mod db;

// Re-export commonly used types
pub use chain::ChainStore;
pub use db::{BatchOp, Result, Storage, StorageError};
