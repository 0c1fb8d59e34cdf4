//! The minibit relay: a broker mediating all peer exchange.
//!
//! Nodes register for a token, open requests, answer each other's
//! requests and drop broadcast blocks and transactions into retention
//! buffers. The relay holds no chain of its own and never judges content
//! beyond the self-parent guard.

pub mod routes;
pub mod state;

// Re-export commonly used types
pub use routes::{router, AppState};
pub use state::{CheckOutcome, PendingRequest, RelaySettings, RelayState, Target};
