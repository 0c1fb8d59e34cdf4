//! Wall clock access.
//!
//! All protocol timestamps are unix milliseconds carried as `u64`, which
//! keeps canonical encodings deterministic.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as u64
}
