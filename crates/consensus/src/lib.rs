//! Proof of Work consensus for minibit.
//!
//! This crate carries the complete rule set:
//! - Difficulty targets, epoch statistics and retargeting
//! - Candidate assembly and the nonce search
//! - Transaction and block validation against the local chain
//! - Fork choice over candidate chains collected from peers
//!
//! # Example
//!
//! ```rust,no_run
//! use minibit_consensus::{assemble_candidate, mine};
//! use minibit_core::{ChainParams, Identity};
//! use minibit_ledger::Ledger;
//! use std::sync::atomic::AtomicBool;
//!
//! let identity = Identity::generate()?;
//! let mut ledger = Ledger::new();
//! ledger.ensure_genesis();
//!
//! // Assemble the next candidate and grind nonces until the target is met
//! let mut candidate = assemble_candidate(&ledger, &identity, &ChainParams::default())?;
//! let outcome = mine(&mut candidate, &AtomicBool::new(false));
//! println!("mined {} ({:?})", candidate.hash, outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod difficulty;
pub mod miner;
pub mod resolver;
pub mod validator;

// Re-export commonly used types
pub use difficulty::{calc_bits, cmp_targets, current_epoch, meets_target, most_frequent_bits};
pub use miner::{assemble_candidate, mine, AssembleError, MineOutcome};
pub use resolver::{resolve, ResolveReason};
pub use validator::{
    BlockOutcome, BlockRejection, Linkage, TextChecker, TextPolicy, TxRejection, Validator,
};
