//! Ledger, registry and node state for petchain.
//!
//! This crate brings the core types, consensus rules and storage together:
//! - **Ledger**: confirmed chain, pending pool, mining and fork resolution
//! - **Registry**: current per-pet state replayed from the chain
//! - **Mempool**: insertion-ordered pending transactions
//! - **Nodes**: peer addresses and the chain-fetching seam
//! - **NodeState**: the locked aggregate shared by the transports
//!
//! # Example
//!
//! ```rust
//! use petchain_chain::{Ledger, LedgerConfig, NodeState, SearchQuery};
//! use petchain_core::{Keypair, LostReport, PetProfile};
//!
//! let node = NodeState::new("node-a", Ledger::new(LedgerConfig::with_difficulty(1)).unwrap());
//! let owner = Keypair::generate();
//!
//! let (pet_id, _) = node
//!     .register_pet(None, PetProfile::new("Max", "Ann", "555-0100"), &owner)
//!     .unwrap();
//! node.mine().unwrap();
//!
//! node.report_lost(pet_id.clone(), &owner, LostReport::default()).unwrap();
//! node.mine().unwrap();
//!
//! let lost = node.search_pets(&SearchQuery::new("max").lost_only(true)).unwrap();
//! assert_eq!(lost[0].pet_id, pet_id);
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod mempool;
pub mod node;
pub mod nodes;
pub mod registry;

// Re-export commonly used types
pub use config::{generate_node_id, LedgerConfig, NodeConfig};
pub use error::{LedgerError, Result};
pub use ledger::{HistoryEntry, Ledger, LedgerStats, Resolution};
pub use mempool::Mempool;
pub use node::{BlockSummary, NodeState, NodeStats, SubmitReceipt};
pub use nodes::{fetch_candidates, normalize_address, NodeSet, PeerClient, PeerError, PrefetchedChains};
pub use registry::{FoundStatus, LostStatus, PetRecord, Registry, RegistryStats, Search, SearchQuery};
