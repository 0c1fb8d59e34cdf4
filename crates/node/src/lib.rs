//! The long-running minibit node.
//!
//! Builds on the lower layers to keep a replicated ledger alive: it
//! syncs through the relay, answers peer requests, persists the chain
//! across restarts and, in mining mode, races proof-of-work attempts
//! against incoming peer blocks.

pub mod node;
pub mod settings;

// Re-export commonly used types
pub use node::{CycleOutcome, Node, NodeError};
pub use settings::NodeSettings;
