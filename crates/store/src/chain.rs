//! Block persistence on sled.

use minibit_core::Block;
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The chain under big-endian u64 index keys, one bincode block per key,
/// so a plain scan walks it bottom-up.
pub struct ChainStore {
    db: Db,
}

impl ChainStore {
    /// Open a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open an in-memory store (for testing).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Persist the whole chain, replacing whatever was stored before.
    /// A full sync can shrink the chain, so leftover tail keys must go.
    pub fn save(&self, chain: &[Block]) -> Result<()> {
        self.db.clear()?;
        let mut batch = sled::Batch::default();
        for (index, block) in chain.iter().enumerate() {
            let key = (index as u64).to_be_bytes();
            batch.insert(&key[..], bincode::serialize(block)?);
        }
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    /// Load the stored chain in index order.
    pub fn load(&self) -> Result<Vec<Block>> {
        let mut chain = Vec::new();
        for entry in self.db.iter() {
            let (_, bytes) = entry?;
            chain.push(bincode::deserialize(&bytes)?);
        }
        Ok(chain)
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}
