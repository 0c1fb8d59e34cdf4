//! Persistent storage for minibit.
//!
//! One sled database holds the chain; the mempool is deliberately not
//! persisted, pending transactions are re-fetched from the relay on
//! startup.

pub mod chain;

// Re-export commonly used types
pub use chain::{ChainStore, Result, StorageError};
