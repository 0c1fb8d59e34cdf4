//! Relay-brokered replication for minibit.
//!
//! Nodes never talk to each other directly; every exchange runs through a
//! relay. This crate provides:
//! - The relay protocol client with bounded retries
//! - Full chain synchronization through the fork-choice resolver
//! - Incremental block and transaction sync with de-duplication
//! - Answering peers' pending full-sync requests

pub mod client;
pub mod replicate;

// Re-export commonly used types
pub use client::{PendingSync, RelayClient, SyncConfig, SyncError};
pub use replicate::{BlockSyncMode, FullSyncOutcome, ObservedBlock, Replicator};
