//! Pending transactions waiting to be mined.

use minibit_core::{Block, Transaction, TxKind};
use std::collections::HashMap;

/// The mempool, keyed by transaction hash.
///
/// Keying by hash keeps simultaneously created transactions distinct even
/// when their timestamps collide; the mining order is recomputed on demand
/// instead of being baked into the storage.
#[derive(Debug, Default)]
pub struct Mempool {
    transactions: HashMap<String, Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            transactions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.transactions.contains_key(hash)
    }

    /// Insert a transaction if it is not already known. Returns false for
    /// duplicates; merging the same transaction twice is routine during
    /// sync, not an error.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if self.transactions.contains_key(&tx.hash) {
            return false;
        }
        self.transactions.insert(tx.hash.clone(), tx);
        true
    }

    /// Drop every transaction the given block confirmed.
    pub fn remove_committed(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.transactions.remove(&tx.hash);
        }
    }

    /// Re-add the transactions of a discarded block so they can be mined
    /// again. Emissions stay out: they are minted at assembly and restoring
    /// one would give the next candidate a second emission.
    pub fn restore(&mut self, block: &Block) {
        for tx in &block.transactions {
            if tx.kind != TxKind::Emission {
                self.insert(tx.clone());
            }
        }
    }

    /// Up to `limit` transactions, most recent first. Timestamp ties are
    /// broken by hash so every node sorts identically.
    pub fn pending(&self, limit: usize) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self.transactions.values().cloned().collect();
        txs.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        txs.truncate(limit);
        txs
    }
}
