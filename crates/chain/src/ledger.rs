//! The ledger: confirmed chain, pending pool and the registry derived from it.

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::mempool::Mempool;
use crate::nodes::{fetch_candidates, NodeSet, PeerClient};
use crate::registry::{PetRecord, Registry};
use petchain_consensus::{BlockValidator, ChainValidator, ProofOfWork, MINING_REWARD};
use petchain_core::{
    verify_claim, Block, Hash, Payload, PetId, PetStatus, PublicKey, Transaction,
};
use petchain_storage::ChainStore;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// One event in a pet's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub transaction: Transaction,
    /// Index of the confirming block, `None` while pending.
    pub block_index: Option<u64>,
    pub block_timestamp: Option<u64>,
    pub pending: bool,
}

/// Outcome of conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// The local chain was replaced by a longer valid one from `peer`.
    Replaced { peer: String, length: usize },
    /// No peer offered a longer valid chain.
    Kept { length: usize },
}

/// Ledger statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub chain_length: usize,
    pub pending_transactions: usize,
    /// Confirmed transactions, rewards included.
    pub total_transactions: usize,
    pub difficulty: u32,
    pub tip_hash: Hash,
}

/// An append-only chain of sealed blocks with its pending pool.
///
/// The chain is never empty and always starts at [`Block::genesis`]. When a
/// [`ChainStore`] is attached every change is written through to it before the
/// in-memory state is updated.
pub struct Ledger {
    chain: Vec<Block>,
    pending: Mempool,
    registry: Registry,
    /// Hashes of every confirmed transaction.
    confirmed: HashSet<Hash>,
    config: LedgerConfig,
    pow: ProofOfWork,
    store: Option<ChainStore>,
}

impl Ledger {
    /// Create an in-memory ledger holding only the genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        Self::from_chain(config, vec![Block::genesis()], None)
    }

    /// Open a ledger backed by `store`.
    ///
    /// An empty store is initialized with genesis; an existing chain is
    /// loaded and validated in full.
    pub fn open(config: LedgerConfig, store: ChainStore) -> Result<Self> {
        if !store.is_initialized()? {
            store.init_genesis(&Block::genesis())?;
        }
        let chain = store.load_chain()?;
        let ledger = Self::from_chain(config, chain, Some(store))?;
        info!(
            length = ledger.chain.len(),
            pets = ledger.registry.len(),
            "loaded chain"
        );
        Ok(ledger)
    }

    fn from_chain(config: LedgerConfig, chain: Vec<Block>, store: Option<ChainStore>) -> Result<Self> {
        config.validate()?;
        let pow = ProofOfWork::new(config.difficulty)?;
        ChainValidator::validate(&chain, config.difficulty)?;

        let mut registry = Registry::new();
        registry.rebuild(&chain);
        let confirmed = confirmed_hashes(&chain);

        Ok(Self {
            chain,
            pending: Mempool::new(),
            registry,
            confirmed,
            config,
            pow,
            store,
        })
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: the chain holds at least the genesis block.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn tip(&self) -> &Block {
        // Non-empty: every chain held here passed ChainValidator.
        &self.chain[self.chain.len() - 1]
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn proof_of_work(&self) -> ProofOfWork {
        self.pow
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pending(&self) -> &Mempool {
        &self.pending
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Validate a transaction against confirmed state and queue it.
    ///
    /// Pending transactions are not consulted, so two pending transactions may
    /// conflict; the registry keeps whichever is confirmed first.
    pub fn submit(&mut self, tx: Transaction) -> Result<Hash> {
        if tx.is_reward() {
            return Err(LedgerError::InvalidTransaction(
                "reward transactions are created by miners".into(),
            ));
        }
        tx.validate()?;
        let key = tx.verify_signature()?;

        match &tx.payload {
            Payload::Register(_) => {
                if self.registry.contains(&tx.pet_id) {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "pet {} is already registered",
                        tx.pet_id
                    )));
                }
                if !verify_claim(&tx.owner, key) {
                    return Err(LedgerError::Unauthorized(
                        "claim key does not match the owner fingerprint".into(),
                    ));
                }
            }
            Payload::ReportFound(_) => {
                let record = self.registry.get(&tx.pet_id)?;
                if record.owner != tx.owner {
                    return Err(LedgerError::Unauthorized(
                        "owner fingerprint does not match the registered owner".into(),
                    ));
                }
                if record.status != PetStatus::Lost {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "pet {} is not reported lost",
                        tx.pet_id
                    )));
                }
            }
            Payload::VetRecord(_) | Payload::ReportLost(_) | Payload::Transfer(_) => {
                let record = self.registry.get(&tx.pet_id)?;
                authorize_owner(record, &tx, key)?;
            }
            Payload::Reward(_) => {}
        }

        let tx_hash = tx.hash();
        if self.confirmed.contains(&tx_hash) {
            return Err(LedgerError::DuplicateTransaction);
        }
        let kind = tx.kind();
        let pet_id = tx.pet_id.clone();
        self.pending.add(tx)?;

        debug!(%pet_id, %kind, tx = %tx_hash, pending = self.pending.len(), "accepted transaction");
        Ok(tx_hash)
    }

    // =========================================================================
    // Mining
    // =========================================================================

    /// Build an unsealed block from the pending pool on top of the current tip.
    ///
    /// Takes the oldest `max_block_transactions` pending transactions and
    /// appends the reward crediting `miner`.
    pub fn prepare_candidate(&self, miner: &str) -> Result<Block> {
        if self.pending.is_empty() {
            return Err(LedgerError::NothingToMine);
        }

        let mut transactions = self.pending.snapshot(self.config.max_block_transactions);
        transactions.push(Transaction::reward(miner, MINING_REWARD)?);

        let tip = self.tip();
        Ok(Block::candidate(tip.index + 1, tip.hash, transactions))
    }

    /// Append a sealed block built on the current tip.
    ///
    /// Fails with `StaleTip` if the tip moved since the candidate was built.
    /// On success the block's transactions leave the pending pool and the
    /// registry is updated.
    pub fn append_mined(&mut self, block: Block) -> Result<&Block> {
        let tip = self.tip();
        if block.previous_hash != tip.hash || block.index != tip.index + 1 {
            return Err(LedgerError::StaleTip);
        }
        BlockValidator::validate_full(&block, tip, self.config.difficulty)?;
        BlockValidator::check_replays(&block, &self.confirmed)?;

        if let Some(store) = &self.store {
            store.append_block(&block)?;
            store.flush()?;
        }

        let included: HashSet<Hash> = block.transactions.iter().map(Transaction::hash).collect();
        self.pending.remove_confirmed(&included);
        self.confirmed.extend(included);
        self.registry.apply(&block);

        info!(
            index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            transactions = block.tx_count(),
            "appended block"
        );
        self.chain.push(block);
        Ok(self.tip())
    }

    /// Mine the pending pool into a new block on the calling thread.
    pub fn mine_pending(&mut self, miner: &str) -> Result<&Block> {
        let candidate = self.prepare_candidate(miner)?;
        let sealed = self.pow.seal(candidate)?;
        self.append_mined(sealed)
    }

    // =========================================================================
    // Validation & Fork Resolution
    // =========================================================================

    /// Check a whole chain against this ledger's rules.
    pub fn is_valid_chain(&self, chain: &[Block]) -> bool {
        ChainValidator::is_valid_chain(chain, self.config.difficulty)
    }

    /// Replace the local chain if `chain` is strictly longer and valid.
    ///
    /// Returns `Ok(false)` when the local chain is kept because the candidate
    /// is not longer. An invalid longer chain is an error and leaves the
    /// ledger untouched.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<bool> {
        if chain.len() <= self.chain.len() {
            return Ok(false);
        }
        ChainValidator::validate(&chain, self.config.difficulty)?;

        if let Some(store) = &self.store {
            store.replace_chain(&chain)?;
            store.flush()?;
        }

        let mut registry = Registry::new();
        registry.rebuild(&chain);
        self.registry = registry;
        self.confirmed = confirmed_hashes(&chain);
        let dropped = self.pending.remove_confirmed(&self.confirmed);

        info!(
            length = chain.len(),
            previous_length = self.chain.len(),
            dropped_pending = dropped,
            "replaced chain"
        );
        self.chain = chain;
        Ok(true)
    }

    /// Adopt the longest valid candidate strictly longer than the local chain.
    ///
    /// Candidates of equal length never displace the local chain. Invalid
    /// candidates are skipped with a warning.
    pub fn adopt_longest(&mut self, mut candidates: Vec<(String, Vec<Block>)>) -> Result<Resolution> {
        // Longest first; the sort is stable so peer order breaks ties.
        candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        for (peer, chain) in candidates {
            if chain.len() <= self.chain.len() {
                break;
            }
            let length = chain.len();
            match self.replace_chain(chain) {
                Ok(true) => return Ok(Resolution::Replaced { peer, length }),
                Ok(false) => break,
                Err(LedgerError::InvalidBlock(err)) => {
                    warn!(%peer, length, error = %err, "rejecting invalid chain");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Resolution::Kept {
            length: self.chain.len(),
        })
    }

    /// Fetch every peer's chain and apply the longest-valid-chain rule.
    ///
    /// Unreachable peers are skipped.
    pub fn resolve_conflicts(&mut self, nodes: &NodeSet, client: &dyn PeerClient) -> Result<Resolution> {
        let candidates = fetch_candidates(nodes, client);
        self.adopt_longest(candidates)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every transaction concerning `pet_id`, confirmed first in chain order,
    /// then pending ones in submission order if requested.
    pub fn history(&self, pet_id: &PetId, include_pending: bool) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self
            .chain
            .iter()
            .flat_map(|block| {
                block.transactions_for(pet_id).map(move |tx| HistoryEntry {
                    transaction: tx.clone(),
                    block_index: Some(block.index),
                    block_timestamp: Some(block.timestamp),
                    pending: false,
                })
            })
            .collect();

        if include_pending {
            entries.extend(self.pending.for_pet(pet_id).map(|tx| HistoryEntry {
                transaction: tx.clone(),
                block_index: None,
                block_timestamp: None,
                pending: true,
            }));
        }
        entries
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            chain_length: self.chain.len(),
            pending_transactions: self.pending.len(),
            total_transactions: self.chain.iter().map(Block::tx_count).sum(),
            difficulty: self.config.difficulty,
            tip_hash: self.tip().hash,
        }
    }
}

fn authorize_owner(record: &PetRecord, tx: &Transaction, key: &PublicKey) -> Result<()> {
    if record.owner != tx.owner {
        return Err(LedgerError::Unauthorized(
            "transaction owner is not the registered owner".into(),
        ));
    }
    if !verify_claim(&record.owner, key) {
        return Err(LedgerError::Unauthorized(
            "claim was not made by the registered owner".into(),
        ));
    }
    Ok(())
}

fn confirmed_hashes(chain: &[Block]) -> HashSet<Hash> {
    chain
        .iter()
        .flat_map(|block| block.transactions.iter().map(Transaction::hash))
        .collect()
}
