//! Blocks: header blob, proof-of-work hash and the genesis sentinel.

use crate::hash::sha256_hex;
use crate::merkle::merkle_root;
use crate::params::{GENESIS_BITS, GENESIS_TIMESTAMP, NULL_HASH};
use crate::time::now_millis;
use crate::transaction::{Transaction, TxKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural violations that abort an operation outright.
#[derive(Debug, Error)]
pub enum BlockError {
    /// A block listing itself as its parent corrupts every consumer
    /// downstream, so it is never treated as a mere validation failure.
    #[error("block {hash} lists itself as its parent")]
    SelfParented { hash: String },
}

/// A block of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Unix milliseconds at assembly.
    pub timestamp: u64,
    pub nonce: u64,
    /// Hash of the parent block, `"0"` for genesis.
    pub previous_hash: String,
    /// Difficulty target as a hex big integer.
    pub bits: String,
    /// Merkle root over the transaction hashes.
    pub merkle_root: String,
    /// Proof-of-work hash of the header blob and nonce.
    pub hash: String,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Start a candidate carrying the given transactions. Linkage,
    /// difficulty and the merkle root are filled in during assembly; hash
    /// and nonce come out of mining.
    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            timestamp: now_millis(),
            nonce: 0,
            previous_hash: String::new(),
            bits: String::new(),
            merkle_root: String::new(),
            hash: String::new(),
            transactions,
        }
    }

    /// The fixed sentinel every chain starts from. It is structurally
    /// constant and never re-validated.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            nonce: 0,
            previous_hash: NULL_HASH.to_string(),
            bits: GENESIS_BITS.to_string(),
            merkle_root: NULL_HASH.to_string(),
            hash: NULL_HASH.to_string(),
            transactions: Vec::new(),
        }
    }

    /// Header string folded with a nonce into the proof-of-work hash.
    pub fn blob(&self) -> String {
        format!(
            "{}{}{}{}",
            self.timestamp, self.bits, self.previous_hash, self.merkle_root
        )
    }

    /// Hash of the header blob and an explicit nonce.
    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        sha256_hex(format!("{}{}", self.blob(), nonce).as_bytes())
    }

    /// Hash of the header blob and the stored nonce.
    pub fn compute_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    /// Recompute the merkle root over the carried transactions.
    pub fn compute_merkle_root(&self) -> String {
        let hashes: Vec<String> = self.transactions.iter().map(|t| t.hash.clone()).collect();
        merkle_root(&hashes)
    }

    pub fn is_genesis(&self) -> bool {
        self.hash == NULL_HASH && self.previous_hash == NULL_HASH
    }

    /// Number of emission transactions carried.
    pub fn emission_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|t| t.kind == TxKind::Emission)
            .count()
    }

    /// Guard against self-parented blocks before using one anywhere.
    pub fn ensure_not_self_parented(&self) -> Result<(), BlockError> {
        if self.previous_hash == self.hash && self.hash != NULL_HASH {
            return Err(BlockError::SelfParented {
                hash: self.hash.clone(),
            });
        }
        Ok(())
    }
}
