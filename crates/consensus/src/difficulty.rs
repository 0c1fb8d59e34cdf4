//! Difficulty targets and the retarget schedule.
//!
//! A target ("bits") is a hex big integer; a hash wins when its value is
//! strictly below it. Comparisons work on normalized hex strings so that a
//! malformed target is still caught by its own dedicated validation step
//! instead of blowing up an earlier one.

use minibit_core::{Block, ChainParams};
use num_bigint::BigUint;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Numeric ordering of two lowercase hex strings without parsing them:
/// strip leading zeros, then shorter means smaller, then bytewise.
pub fn cmp_targets(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Whether a hash value lies strictly below the target.
pub fn meets_target(hash: &str, bits: &str) -> bool {
    cmp_targets(hash, bits) == Ordering::Less
}

/// The slice of the chain belonging to the current (possibly partial)
/// retarget window.
pub fn current_epoch<'a>(chain: &'a [Block], params: &ChainParams) -> &'a [Block] {
    let interval = params.retarget_interval as usize;
    let start = interval * (chain.len() / interval);
    &chain[start..]
}

/// The most frequent `bits` value in the given blocks; count ties resolve
/// to the value seen first in chain order.
pub fn most_frequent_bits(blocks: &[Block]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for block in blocks {
        *counts.entry(block.bits.as_str()).or_insert(0) += 1;
    }
    let best = counts.values().copied().max()?;
    blocks
        .iter()
        .map(|b| b.bits.as_str())
        .find(|bits| counts[bits] == best)
        .map(str::to_string)
}

/// The target for the next block.
///
/// Off the retarget boundary the inherited target passes through. On the
/// boundary the previous target is scaled by desired-over-observed block
/// spacing, clamped to [1/4, 4], all in integer arithmetic so every node
/// computes the identical string.
pub fn calc_bits(chain: &[Block], inherited: &str, params: &ChainParams, now_millis: u64) -> String {
    let len = chain.len() as u64;
    let interval = params.retarget_interval;
    if len == 0 || len % interval != 0 {
        return inherited.to_string();
    }

    let target = match BigUint::parse_bytes(inherited.as_bytes(), 16) {
        Some(t) => t,
        None => return inherited.to_string(),
    };

    let window_start = &chain[(len - interval) as usize];
    let window_millis = now_millis.saturating_sub(window_start.timestamp).max(1);
    let avg_millis = (window_millis / interval).max(1);
    let desired = params.target_block_millis;

    let scaled = if desired >= avg_millis.saturating_mul(4) {
        target * 4u32
    } else if desired.saturating_mul(4) <= avg_millis {
        target / 4u32
    } else {
        target * desired / avg_millis
    };

    if scaled == BigUint::default() {
        "1".to_string()
    } else {
        scaled.to_str_radix(16)
    }
}
