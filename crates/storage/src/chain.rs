//! Block storage and chain height tracking.

use crate::db::{BatchOp, Result, Storage, StorageError};
use petchain_core::Block;

/// Key holding the index of the last stored block.
const CHAIN_HEIGHT_KEY: &[u8] = b"chain:height";

/// Persists the chain as one entry per block index.
#[derive(Clone)]
pub struct ChainStore {
    storage: Storage,
}

impl ChainStore {
    /// Create a new ChainStore over the given storage handle.
    pub fn new(storage: &Storage) -> Self {
        Self {
            storage: storage.clone(),
        }
    }

    // =========================================================================
    // Block Storage
    // =========================================================================

    /// Get a block by its index.
    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        self.storage.get(Storage::block_height_key(index))
    }

    // =========================================================================
    // Chain Height Tracking
    // =========================================================================

    /// Index of the last stored block, `None` if the chain is not initialized.
    pub fn get_height(&self) -> Result<Option<u64>> {
        self.storage.get(CHAIN_HEIGHT_KEY)
    }

    /// Check if the chain is initialized (has a genesis block).
    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.get_height()?.is_some())
    }

    /// Get the latest block.
    pub fn get_latest_block(&self) -> Result<Option<Block>> {
        match self.get_height()? {
            Some(height) => self.get_block(height),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Genesis Block
    // =========================================================================

    /// Initialize the chain with a genesis block.
    ///
    /// Fails if the block is not at index 0 or the chain is already initialized.
    pub fn init_genesis(&self, genesis: &Block) -> Result<()> {
        if !genesis.is_genesis() {
            return Err(StorageError::InvalidGenesis(
                "Genesis block must have index 0".into(),
            ));
        }

        if self.is_initialized()? {
            return Err(StorageError::InvalidGenesis(
                "Chain already initialized".into(),
            ));
        }

        self.storage.batch(vec![
            BatchOp::put(Storage::block_height_key(0), genesis)?,
            BatchOp::put(CHAIN_HEIGHT_KEY.to_vec(), &0u64)?,
        ])
    }

    // =========================================================================
    // Chain Operations
    // =========================================================================

    /// Append a block to the stored chain.
    ///
    /// Requires the block to sit at `height + 1` and link to the stored tip.
    /// Consensus rules are checked by the caller before this is reached.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let tip = self
            .get_latest_block()?
            .ok_or_else(|| StorageError::ChainMismatch("chain not initialized".into()))?;

        if block.index != tip.index + 1 {
            return Err(StorageError::ChainMismatch(format!(
                "expected block index {}, got {}",
                tip.index + 1,
                block.index
            )));
        }

        if block.previous_hash != tip.hash {
            return Err(StorageError::ChainMismatch(format!(
                "block previous_hash {} doesn't match stored tip {}",
                block.previous_hash, tip.hash
            )));
        }

        self.storage.batch(vec![
            BatchOp::put(Storage::block_height_key(block.index), block)?,
            BatchOp::put(CHAIN_HEIGHT_KEY.to_vec(), &block.index)?,
        ])
    }

    /// Replace the whole stored chain in one atomic batch.
    ///
    /// Entries above the new height are removed.
    pub fn replace_chain(&self, chain: &[Block]) -> Result<()> {
        let new_height = match chain.last() {
            Some(tip) => tip.index,
            None => return Err(StorageError::InvalidGenesis("empty chain".into())),
        };

        let mut ops = Vec::with_capacity(chain.len() + 1);
        for (position, block) in chain.iter().enumerate() {
            if block.index != position as u64 {
                return Err(StorageError::ChainMismatch(format!(
                    "block at position {} has index {}",
                    position, block.index
                )));
            }
            ops.push(BatchOp::put(Storage::block_height_key(block.index), block)?);
        }

        if let Some(old_height) = self.get_height()? {
            for index in (new_height + 1)..=old_height {
                ops.push(BatchOp::Remove {
                    key: Storage::block_height_key(index),
                });
            }
        }

        ops.push(BatchOp::put(CHAIN_HEIGHT_KEY.to_vec(), &new_height)?);
        self.storage.batch(ops)
    }

    /// Get blocks in a range [from, to].
    pub fn get_blocks_range(&self, from: u64, to: u64) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for index in from..=to {
            if let Some(block) = self.get_block(index)? {
                blocks.push(block);
            } else {
                break; // Stop at first missing block
            }
        }
        Ok(blocks)
    }

    /// Load the full stored chain from genesis to tip.
    ///
    /// Returns an empty vector if the chain was never initialized. A gap below
    /// the recorded height is reported as corruption.
    pub fn load_chain(&self) -> Result<Vec<Block>> {
        let height = match self.get_height()? {
            Some(height) => height,
            None => return Ok(Vec::new()),
        };

        let blocks = self.get_blocks_range(0, height)?;
        if blocks.len() as u64 != height + 1 {
            return Err(StorageError::Corrupt(format!(
                "expected {} blocks, found {}",
                height + 1,
                blocks.len()
            )));
        }
        Ok(blocks)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.storage.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petchain_core::{Hash, Transaction};

    fn setup() -> ChainStore {
        ChainStore::new(&Storage::open_temporary().unwrap())
    }

    fn next_block(previous: &Block) -> Block {
        Block::candidate(
            previous.index + 1,
            previous.hash,
            vec![Transaction::reward("miner", 1).unwrap()],
        )
    }

    fn chain_of(len: usize) -> Vec<Block> {
        let mut chain = vec![Block::genesis()];
        while chain.len() < len {
            let next = next_block(chain.last().unwrap());
            chain.push(next);
        }
        chain
    }

    #[test]
    fn test_genesis_init() {
        let store = setup();
        assert!(!store.is_initialized().unwrap());

        let genesis = Block::genesis();
        store.init_genesis(&genesis).unwrap();

        assert!(store.is_initialized().unwrap());
        assert_eq!(store.get_height().unwrap(), Some(0));
        assert_eq!(store.get_latest_block().unwrap(), Some(genesis));
    }

    #[test]
    fn test_genesis_double_init_fails() {
        let store = setup();
        store.init_genesis(&Block::genesis()).unwrap();

        let result = store.init_genesis(&Block::genesis());
        assert!(matches!(result, Err(StorageError::InvalidGenesis(_))));
    }

    #[test]
    fn test_non_genesis_as_genesis_fails() {
        let store = setup();
        let block = next_block(&Block::genesis());

        let result = store.init_genesis(&block);
        assert!(matches!(result, Err(StorageError::InvalidGenesis(_))));
    }

    #[test]
    fn test_append_block() {
        let store = setup();
        let chain = chain_of(3);
        store.init_genesis(&chain[0]).unwrap();

        store.append_block(&chain[1]).unwrap();
        store.append_block(&chain[2]).unwrap();

        assert_eq!(store.get_height().unwrap(), Some(2));
        assert_eq!(store.get_block(1).unwrap().as_ref(), Some(&chain[1]));
        assert_eq!(store.load_chain().unwrap(), chain);
    }

    #[test]
    fn test_append_wrong_index_fails() {
        let store = setup();
        store.init_genesis(&Block::genesis()).unwrap();

        let mut block = next_block(&Block::genesis());
        block.index = 5;
        let result = store.append_block(&block);
        assert!(matches!(result, Err(StorageError::ChainMismatch(_))));
    }

    #[test]
    fn test_append_wrong_previous_hash_fails() {
        let store = setup();
        store.init_genesis(&Block::genesis()).unwrap();

        let mut block = next_block(&Block::genesis());
        block.previous_hash = Hash::from_bytes([0xFF; 32]);
        let result = store.append_block(&block);
        assert!(matches!(result, Err(StorageError::ChainMismatch(_))));
    }

    #[test]
    fn test_append_before_init_fails() {
        let store = setup();
        let result = store.append_block(&next_block(&Block::genesis()));
        assert!(matches!(result, Err(StorageError::ChainMismatch(_))));
    }

    #[test]
    fn test_replace_with_longer_chain() {
        let store = setup();
        let short = chain_of(2);
        store.replace_chain(&short).unwrap();

        let long = chain_of(5);
        store.replace_chain(&long).unwrap();

        assert_eq!(store.get_height().unwrap(), Some(4));
        assert_eq!(store.load_chain().unwrap(), long);
    }

    #[test]
    fn test_replace_with_shorter_chain_removes_tail() {
        let store = setup();
        store.replace_chain(&chain_of(5)).unwrap();

        let short = chain_of(2);
        store.replace_chain(&short).unwrap();

        assert_eq!(store.load_chain().unwrap(), short);
        assert!(store.get_block(3).unwrap().is_none());
    }

    #[test]
    fn test_replace_rejects_misnumbered_chain() {
        let store = setup();
        let mut chain = chain_of(3);
        chain.remove(1);

        let result = store.replace_chain(&chain);
        assert!(matches!(result, Err(StorageError::ChainMismatch(_))));
        assert!(!store.is_initialized().unwrap());
    }

    #[test]
    fn test_load_uninitialized_is_empty() {
        assert!(setup().load_chain().unwrap().is_empty());
    }

    #[test]
    fn test_gap_reported_as_corrupt() {
        let storage = Storage::open_temporary().unwrap();
        let store = ChainStore::new(&storage);
        store.replace_chain(&chain_of(3)).unwrap();

        storage
            .batch(vec![BatchOp::Remove {
                key: Storage::block_height_key(1),
            }])
            .unwrap();
        assert!(matches!(store.load_chain(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let chain = chain_of(3);
        {
            let store = ChainStore::new(&Storage::open(dir.path()).unwrap());
            store.replace_chain(&chain).unwrap();
            store.flush().unwrap();
        }

        let store = ChainStore::new(&Storage::open(dir.path()).unwrap());
        assert_eq!(store.load_chain().unwrap(), chain);
    }
}
