//! Node-local chain state and queries.

use crate::mempool::Mempool;
use minibit_core::{Block, Transaction};

/// The chain and mempool of one node.
///
/// The chain is append-only in normal operation and only replaced wholesale
/// by a full resynchronization. The transaction history is the single source
/// of truth: balances are replayed from it rather than kept as running
/// account state.
#[derive(Debug, Default)]
pub struct Ledger {
    chain: Vec<Block>,
    mempool: Mempool,
}

/// A snapshot of the headline numbers, for logs and status output.
#[derive(Debug, Clone)]
pub struct LedgerStats {
    pub height: usize,
    pub tip_hash: Option<String>,
    pub pending_transactions: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            chain: Vec::new(),
            mempool: Mempool::new(),
        }
    }

    /// Rebuild state from a previously persisted chain.
    pub fn from_chain(chain: Vec<Block>) -> Self {
        Self {
            chain,
            mempool: Mempool::new(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Chain length; validation rules quote this as the chain depth.
    pub fn depth(&self) -> u64 {
        self.chain.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// The block `offset` places below the tip; `nth_from_tip(0)` is the tip.
    pub fn nth_from_tip(&self, offset: usize) -> Option<&Block> {
        if offset >= self.chain.len() {
            return None;
        }
        self.chain.get(self.chain.len() - 1 - offset)
    }

    pub fn contains_block(&self, hash: &str) -> bool {
        self.chain.iter().any(|b| b.hash == hash)
    }

    pub fn append(&mut self, block: Block) {
        self.chain.push(block);
    }

    pub fn pop_tip(&mut self) -> Option<Block> {
        self.chain.pop()
    }

    /// Replace the whole chain after a full sync resolved a winner.
    pub fn replace_chain(&mut self, chain: Vec<Block>) {
        self.chain = chain;
    }

    /// Make sure the chain starts with the genesis sentinel: synthesize it
    /// for an empty chain, prepend it when the first block is something
    /// else. Returns true when a sentinel was added.
    pub fn ensure_genesis(&mut self) -> bool {
        if self.chain.is_empty() {
            self.chain.push(Block::genesis());
            return true;
        }
        if !self.chain[0].is_genesis() {
            self.chain.insert(0, Block::genesis());
            return true;
        }
        false
    }

    /// Balance of an address: every credited amount minus every debited
    /// amount, replayed over the full chain from the newest block down.
    pub fn balance(&self, address: &str) -> i64 {
        let mut balance: i64 = 0;
        for block in self.chain.iter().rev() {
            for tx in &block.transactions {
                if tx.output == address {
                    balance += tx.amount as i64;
                }
                if tx.input == address {
                    balance -= tx.amount as i64;
                }
            }
        }
        balance
    }

    /// How deeply a transaction is buried: the number of blocks above the
    /// one containing it, or None when it is not on the chain.
    pub fn confirmation_depth(&self, tx_hash: &str) -> Option<usize> {
        for (above, block) in self.chain.iter().rev().enumerate() {
            if block.transactions.iter().any(|t| t.hash == tx_hash) {
                return Some(above);
            }
        }
        None
    }

    pub fn is_confirmed(&self, tx_hash: &str) -> bool {
        self.confirmation_depth(tx_hash).is_some()
    }

    // Mempool access goes through the ledger so one lock guards both.

    pub fn add_pending(&mut self, tx: Transaction) -> bool {
        self.mempool.insert(tx)
    }

    pub fn has_pending(&self, tx_hash: &str) -> bool {
        self.mempool.contains(tx_hash)
    }

    pub fn pending_count(&self) -> usize {
        self.mempool.len()
    }

    /// Transactions for the next candidate block, most recent first.
    pub fn pending_for_mining(&self, limit: usize) -> Vec<Transaction> {
        self.mempool.pending(limit)
    }

    /// Drop the transactions a freshly adopted block confirmed.
    pub fn strip_committed(&mut self, block: &Block) {
        self.mempool.remove_committed(block);
    }

    /// Return a discarded block's transactions to the mempool.
    pub fn restore_pending(&mut self, block: &Block) {
        self.mempool.restore(block);
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            height: self.chain.len(),
            tip_hash: self.tip().map(|b| b.hash.clone()),
            pending_transactions: self.mempool.len(),
        }
    }
}
