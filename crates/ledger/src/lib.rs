//! Chain state and mempool for minibit nodes.
//!
//! The [`Ledger`] owns a node's view of the chain together with its pending
//! transactions and answers the balance and confirmation queries everything
//! else is built on.

pub mod mempool;
pub mod state;

pub use mempool::Mempool;
pub use state::{Ledger, LedgerStats};
