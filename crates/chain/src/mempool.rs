//! Pool of pending transactions.
//!
//! The pool stores accepted transactions waiting to be included in a block,
//! in the order they were submitted.

use crate::error::{LedgerError, Result};
use petchain_core::{Hash, PetId, Transaction};
use std::collections::{HashMap, HashSet, VecDeque};

/// Insertion-ordered pool of unconfirmed transactions.
#[derive(Debug, Default)]
pub struct Mempool {
    /// Transactions indexed by hash.
    transactions: HashMap<Hash, Transaction>,
    /// Submission order.
    order: VecDeque<Hash>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, tx_hash: &Hash) -> bool {
        self.transactions.contains_key(tx_hash)
    }

    /// Add a transaction at the back of the pool.
    pub fn add(&mut self, tx: Transaction) -> Result<Hash> {
        let tx_hash = tx.hash();
        if self.contains(&tx_hash) {
            return Err(LedgerError::DuplicateTransaction);
        }

        self.order.push_back(tx_hash);
        self.transactions.insert(tx_hash, tx);
        Ok(tx_hash)
    }

    /// Up to `limit` transactions from the front of the pool, oldest first.
    ///
    /// The pool is unchanged; included transactions leave it only once their
    /// block is appended.
    pub fn snapshot(&self, limit: usize) -> Vec<Transaction> {
        self.iter().take(limit).cloned().collect()
    }

    /// Pending transactions in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.order.iter().filter_map(|h| self.transactions.get(h))
    }

    /// Pending transactions concerning `pet_id`, in submission order.
    pub fn for_pet<'a>(&'a self, pet_id: &'a PetId) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.iter().filter(move |tx| &tx.pet_id == pet_id)
    }

    /// Drop every transaction whose hash is in `confirmed`.
    pub fn remove_confirmed(&mut self, confirmed: &HashSet<Hash>) -> usize {
        let before = self.len();
        self.order.retain(|h| !confirmed.contains(h));
        self.transactions.retain(|h, _| !confirmed.contains(h));
        before - self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petchain_core::{Keypair, LostReport, PetProfile};

    fn register(keypair: &Keypair, id: &str) -> Transaction {
        Transaction::register(id.into(), keypair.fingerprint(), PetProfile::new("Max", "Ann", "555"))
            .unwrap()
            .signed(keypair)
    }

    #[test]
    fn test_mempool_add() {
        let mut mempool = Mempool::new();
        let keypair = Keypair::generate();
        let tx = register(&keypair, "P1");

        let tx_hash = mempool.add(tx.clone()).unwrap();
        assert_eq!(tx_hash, tx.hash());
        assert_eq!(mempool.len(), 1);
        assert!(mempool.contains(&tx_hash));
        assert_eq!(mempool.snapshot(1), vec![tx]);
    }

    #[test]
    fn test_mempool_duplicate_rejected() {
        let mut mempool = Mempool::new();
        let keypair = Keypair::generate();
        let tx = register(&keypair, "P1");

        mempool.add(tx.clone()).unwrap();
        assert!(matches!(
            mempool.add(tx),
            Err(LedgerError::DuplicateTransaction)
        ));
        assert_eq!(mempool.len(), 1);
    }

    #[test]
    fn test_snapshot_is_fifo_and_bounded() {
        let mut mempool = Mempool::new();
        let keypair = Keypair::generate();
        let txs: Vec<_> = ["P3", "P1", "P2"].iter().map(|id| register(&keypair, id)).collect();
        for tx in &txs {
            mempool.add(tx.clone()).unwrap();
        }

        assert_eq!(mempool.snapshot(10), txs);
        assert_eq!(mempool.snapshot(2), txs[..2].to_vec());
        assert_eq!(mempool.len(), 3);
    }

    #[test]
    fn test_remove_confirmed_keeps_order() {
        let mut mempool = Mempool::new();
        let keypair = Keypair::generate();
        let a = register(&keypair, "A");
        let b = register(&keypair, "B");
        let c = register(&keypair, "C");
        for tx in [&a, &b, &c] {
            mempool.add(tx.clone()).unwrap();
        }

        let confirmed: HashSet<Hash> = [b.hash()].into_iter().collect();
        assert_eq!(mempool.remove_confirmed(&confirmed), 1);
        assert_eq!(mempool.snapshot(10), vec![a, c]);
    }

    #[test]
    fn test_for_pet() {
        let mut mempool = Mempool::new();
        let keypair = Keypair::generate();
        mempool.add(register(&keypair, "P1")).unwrap();
        mempool.add(register(&keypair, "P2")).unwrap();
        mempool
            .add(
                Transaction::report_lost("P1".into(), keypair.fingerprint(), LostReport::default())
                    .unwrap()
                    .signed(&keypair),
            )
            .unwrap();

        let p1 = PetId::from("P1");
        assert_eq!(mempool.for_pet(&p1).count(), 2);
    }
}
