//! Core ledger primitives for minibit.
//!
//! This crate provides the fundamental types used throughout the system:
//! - SHA-256 hashing helpers over the hex-string wire forms
//! - RSA identities, addresses and PSS signatures
//! - Transactions and blocks with their canonical encodings
//! - Merkle roots
//! - The consensus parameter set

pub mod block;
pub mod hash;
pub mod identity;
pub mod merkle;
pub mod params;
pub mod time;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{Block, BlockError};
pub use hash::{hash_pair, sha256_bytes, sha256_hex};
pub use identity::{derive_address, verify_signature, Identity, IdentityError};
pub use merkle::merkle_root;
pub use params::{ChainParams, EMISSION_INPUT, GENESIS_BITS, GENESIS_TIMESTAMP, NULL_HASH};
pub use time::now_millis;
pub use transaction::{Transaction, TxKind};
