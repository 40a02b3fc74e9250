//! Shared node state: the single aggregate the transports operate on.
//!
//! All mutation goes through [`NodeState`]. Submissions, block appends and
//! chain replacement take the write lock; queries take the read lock and so
//! only ever observe whole blocks. Proof-of-work runs on a snapshot outside
//! the lock, and its result is discarded if the tip moved in the meantime.

use crate::config::NodeConfig;
use crate::error::{LedgerError, Result};
use crate::ledger::{HistoryEntry, Ledger, Resolution};
use crate::nodes::{fetch_candidates, NodeSet, PeerClient};
use crate::registry::{PetRecord, SearchQuery};
use petchain_consensus::{CancelToken, PowError, MINING_REWARD};
use petchain_core::{
    timestamp_millis, Block, Fingerprint, FoundReport, Hash, Keypair, LostReport, PetId,
    PetProfile, Transaction, VetEntry,
};
use petchain_storage::{ChainStore, Storage};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Acknowledgement of an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub tx_hash: Hash,
    pub pending_count: usize,
    /// Index of the block the transaction will land in if mined next.
    pub expected_block: u64,
}

/// Summary of a freshly mined block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub index: u64,
    pub hash: Hash,
    pub previous_hash: Hash,
    pub nonce: u64,
    pub timestamp: u64,
    pub transaction_count: usize,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            hash: block.hash,
            previous_hash: block.previous_hash,
            nonce: block.nonce,
            timestamp: block.timestamp,
            transaction_count: block.tx_count(),
        }
    }
}

/// Node statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub node_id: String,
    pub chain_length: usize,
    pub pending_count: usize,
    pub pet_count: usize,
    pub active_count: usize,
    pub lost_count: usize,
    pub found_count: usize,
    pub vet_record_count: usize,
    pub total_transactions: usize,
    pub difficulty: u32,
    pub node_count: usize,
    pub mining_reward: u64,
}

struct Inner {
    ledger: Ledger,
    nodes: NodeSet,
}

/// A node's ledger, registry and peer set behind one lock.
pub struct NodeState {
    node_id: String,
    inner: RwLock<Inner>,
    /// Bumped on every chain replacement; in-flight mining aborts when it changes.
    epoch: AtomicU64,
    shutdown: CancelToken,
    mining: Mutex<()>,
}

impl NodeState {
    pub fn new(node_id: impl Into<String>, ledger: Ledger) -> Self {
        Self::with_nodes(node_id, ledger, NodeSet::new())
    }

    pub fn with_nodes(node_id: impl Into<String>, ledger: Ledger, nodes: NodeSet) -> Self {
        Self {
            node_id: node_id.into(),
            inner: RwLock::new(Inner { ledger, nodes }),
            epoch: AtomicU64::new(0),
            shutdown: CancelToken::new(),
            mining: Mutex::new(()),
        }
    }

    /// Build a node from its configuration, opening sled storage when a data
    /// directory is configured.
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        config.validate()?;

        let ledger = match &config.data_dir {
            Some(dir) => {
                let storage = Storage::open(dir.join("chain"))?;
                Ledger::open(config.ledger.clone(), ChainStore::new(&storage))?
            }
            None => Ledger::new(config.ledger.clone())?,
        };

        let mut nodes = NodeSet::new();
        for peer in &config.peers {
            nodes.register(peer)?;
        }

        info!(
            node_id = %config.node_id,
            difficulty = config.ledger.difficulty,
            peers = nodes.len(),
            "node state ready"
        );
        Ok(Self::with_nodes(config.node_id.clone(), ledger, nodes))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }

    // =========================================================================
    // Transactions & Mining
    // =========================================================================

    pub fn submit_transaction(&self, tx: Transaction) -> Result<SubmitReceipt> {
        let mut inner = self.write()?;
        let tx_hash = inner.ledger.submit(tx)?;
        Ok(SubmitReceipt {
            tx_hash,
            pending_count: inner.ledger.pending().len(),
            expected_block: inner.ledger.tip().index + 1,
        })
    }

    /// Mine the pending pool into a block.
    ///
    /// Only one mine runs at a time. The search aborts with `MiningCancelled`
    /// after [`NodeState::cancel_mining`], or with `StaleTip` when the chain
    /// is replaced while it runs; either way no block is appended.
    pub fn mine(&self) -> Result<BlockSummary> {
        let _mining = self.mining.lock().map_err(|_| LedgerError::LockPoisoned)?;
        if self.shutdown.is_cancelled() {
            return Err(LedgerError::MiningCancelled);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let (candidate, pow) = {
            let inner = self.read()?;
            (
                inner.ledger.prepare_candidate(&self.node_id)?,
                inner.ledger.proof_of_work(),
            )
        };

        let sealed = pow
            .seal_with(candidate, || {
                self.shutdown.is_cancelled() || self.epoch.load(Ordering::SeqCst) != epoch
            })
            .map_err(|err| match err {
                PowError::Cancelled { .. } if !self.shutdown.is_cancelled() => LedgerError::StaleTip,
                err => err.into(),
            })?;

        let mut inner = self.write()?;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            warn!(index = sealed.index, "chain replaced while mining; discarding block");
            return Err(LedgerError::StaleTip);
        }
        let block = inner.ledger.append_mined(sealed)?;
        Ok(BlockSummary::from(block))
    }

    /// Abort any in-flight mining and refuse new mining until resumed.
    pub fn cancel_mining(&self) {
        self.shutdown.cancel();
    }

    pub fn resume_mining(&self) {
        self.shutdown.reset();
    }

    pub fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.read()?.ledger.pending().iter().cloned().collect())
    }

    pub fn get_chain(&self) -> Result<Vec<Block>> {
        Ok(self.read()?.ledger.chain().to_vec())
    }

    // =========================================================================
    // Peers
    // =========================================================================

    /// Register a peer and return its normalized address.
    pub fn register_node(&self, address: &str) -> Result<String> {
        let normalized = self.write()?.nodes.register(address)?;
        info!(peer = %normalized, "registered node");
        Ok(normalized)
    }

    pub fn nodes(&self) -> Result<Vec<String>> {
        Ok(self.read()?.nodes.to_vec())
    }

    /// Apply the longest-valid-chain rule against every known peer.
    ///
    /// Peer chains are fetched without holding the lock.
    pub fn resolve_conflicts(&self, client: &dyn PeerClient) -> Result<Resolution> {
        let nodes = self.read()?.nodes.clone();
        let candidates = fetch_candidates(&nodes, client);

        let mut inner = self.write()?;
        let resolution = inner.ledger.adopt_longest(candidates)?;
        if matches!(resolution, Resolution::Replaced { .. }) {
            self.chain_replaced();
        }
        Ok(resolution)
    }

    /// Replace the local chain with `chain` if it is valid and strictly longer.
    pub fn import_chain(&self, chain: Vec<Block>) -> Result<bool> {
        let mut inner = self.write()?;
        let replaced = inner.ledger.replace_chain(chain)?;
        if replaced {
            self.chain_replaced();
        }
        Ok(replaced)
    }

    /// Invalidate in-flight mining after the tip was replaced.
    fn chain_replaced(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    // =========================================================================
    // Pets
    // =========================================================================

    pub fn get_pet(&self, pet_id: &PetId) -> Result<PetRecord> {
        self.read()?.ledger.registry().get(pet_id).cloned()
    }

    pub fn search_pets(&self, query: &SearchQuery) -> Result<Vec<PetRecord>> {
        Ok(self
            .read()?
            .ledger
            .registry()
            .search(query)
            .cloned()
            .collect())
    }

    /// Register a pet owned by `owner`. Without an explicit id one is derived
    /// from the microchip, the owner and the current time.
    pub fn register_pet(
        &self,
        pet_id: Option<PetId>,
        profile: PetProfile,
        owner: &Keypair,
    ) -> Result<(PetId, SubmitReceipt)> {
        let fingerprint = owner.fingerprint();
        let timestamp = timestamp_millis();
        let pet_id = pet_id.unwrap_or_else(|| {
            let microchip = profile.microchip_id.as_deref().unwrap_or_default();
            PetId::generate(microchip, &fingerprint, timestamp)
        });
        let tx = Transaction::register(pet_id, fingerprint, profile)?.at(timestamp);
        let pet_id = tx.pet_id.clone();
        let receipt = self.submit_transaction(tx.signed(owner))?;
        Ok((pet_id, receipt))
    }

    pub fn add_vet_record(&self, pet_id: PetId, owner: &Keypair, entry: VetEntry) -> Result<SubmitReceipt> {
        let tx = Transaction::vet_record(pet_id, owner.fingerprint(), entry)?.signed(owner);
        self.submit_transaction(tx)
    }

    pub fn report_lost(&self, pet_id: PetId, owner: &Keypair, report: LostReport) -> Result<SubmitReceipt> {
        let tx = Transaction::report_lost(pet_id, owner.fingerprint(), report)?.signed(owner);
        self.submit_transaction(tx)
    }

    /// Report a lost pet found. `owner` is the registered owner's fingerprint
    /// as shown on the public record; `finder` signs.
    pub fn report_found(
        &self,
        pet_id: PetId,
        owner: Fingerprint,
        finder: &Keypair,
        report: FoundReport,
    ) -> Result<SubmitReceipt> {
        let tx = Transaction::report_found(pet_id, owner, report)?.signed(finder);
        self.submit_transaction(tx)
    }

    pub fn transfer(&self, pet_id: PetId, owner: &Keypair, new_owner: Fingerprint) -> Result<SubmitReceipt> {
        let tx = Transaction::transfer(pet_id, owner.fingerprint(), new_owner)?.signed(owner);
        self.submit_transaction(tx)
    }

    /// A pet's confirmed history, optionally followed by its pending events.
    pub fn get_history(&self, pet_id: &PetId, include_pending: bool) -> Result<Vec<HistoryEntry>> {
        let history = self.read()?.ledger.history(pet_id, include_pending);
        if history.is_empty() {
            return Err(LedgerError::NotFound(format!("pet {}", pet_id)));
        }
        Ok(history)
    }

    pub fn get_stats(&self) -> Result<NodeStats> {
        let inner = self.read()?;
        let ledger = inner.ledger.stats();
        let registry = inner.ledger.registry().stats();
        Ok(NodeStats {
            node_id: self.node_id.clone(),
            chain_length: ledger.chain_length,
            pending_count: ledger.pending_transactions,
            pet_count: registry.total_pets,
            active_count: registry.active_pets,
            lost_count: registry.lost_pets,
            found_count: registry.found_pets,
            vet_record_count: registry.vet_records,
            total_transactions: ledger.total_transactions,
            difficulty: ledger.difficulty,
            node_count: inner.nodes.len(),
            mining_reward: MINING_REWARD,
        })
    }
}
