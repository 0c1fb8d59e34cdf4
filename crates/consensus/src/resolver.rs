//! Fork choice over candidate chains collected from peers.

use minibit_core::Block;
use std::cmp::Reverse;
use std::fmt;

/// Which rule picked the winning chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveReason {
    /// At least 51 percent of the candidates are the same chain.
    Majority,
    /// All candidates equally long; the one whose tip is oldest wins.
    EarliestTip,
    /// The longest candidate, ties broken towards the older tip.
    Longest,
}

impl fmt::Display for ResolveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveReason::Majority => write!(f, "majority"),
            ResolveReason::EarliestTip => write!(f, "earliest-tip"),
            ResolveReason::Longest => write!(f, "longest"),
        }
    }
}

/// Ordering key for tips: assembly time first, hash as the final word.
fn tip_key(chain: &[Block]) -> (u64, String) {
    chain
        .last()
        .map(|b| (b.timestamp, b.hash.clone()))
        .unwrap_or((0, String::new()))
}

/// Pick one chain out of the candidates.
///
/// The outcome never depends on candidate order: a strict majority is
/// unique when it exists, and both fallback rules order by the total
/// (timestamp, hash) tip key.
pub fn resolve(candidates: &[Vec<Block>]) -> Option<(Vec<Block>, ResolveReason)> {
    if candidates.is_empty() {
        return None;
    }
    let total = candidates.len();

    for candidate in candidates {
        let identical = candidates.iter().filter(|c| *c == candidate).count();
        if identical * 100 >= total * 51 {
            return Some((candidate.clone(), ResolveReason::Majority));
        }
    }

    if candidates.iter().all(|c| c.len() == candidates[0].len()) {
        let winner = candidates.iter().min_by_key(|c| tip_key(c))?;
        return Some((winner.clone(), ResolveReason::EarliestTip));
    }

    let winner = candidates
        .iter()
        .max_by_key(|c| (c.len(), Reverse(tip_key(c))))?;
    Some((winner.clone(), ResolveReason::Longest))
}
