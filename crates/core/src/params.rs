//! Consensus parameters shared by every component.
//!
//! The emission schedule, difficulty cadence and block shape all read from a
//! single [`ChainParams`] value so that miners, validators and the sync layer
//! can never disagree on the rules.

/// Sentinel standing in for a hash that does not exist.
pub const NULL_HASH: &str = "0";

/// Fixed timestamp of the genesis sentinel, unix milliseconds.
pub const GENESIS_TIMESTAMP: u64 = 1_748_884_072_000;

/// Difficulty target the chain starts from, as a hex big integer.
pub const GENESIS_BITS: &str =
    "00ff00000000000000000000000000000000000000000000000000000000000";

/// Input tag carried by emission transactions instead of a sender address.
pub const EMISSION_INPUT: &str = "coinbase";

/// Tunable consensus constants.
#[derive(Debug, Clone)]
pub struct ChainParams {
    /// Coins minted per block before any halving.
    pub start_emission: u64,
    /// Blocks between emission halvings.
    pub halving_interval: u64,
    /// Blocks between difficulty retargets.
    pub retarget_interval: u64,
    /// Desired spacing between blocks, milliseconds.
    pub target_block_millis: u64,
    /// Transactions drawn from the mempool per block, emission excluded.
    pub txs_per_block: usize,
    /// Tolerated clock skew into the future for block timestamps, milliseconds.
    pub max_future_drift_millis: u64,
    /// Age window within which a relayed block still counts as fresh, milliseconds.
    pub fresh_window_millis: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            start_emission: 40,
            halving_interval: 210_000,
            retarget_interval: 2_500,
            target_block_millis: 120_000,
            txs_per_block: 5,
            max_future_drift_millis: 7_200_000,
            fresh_window_millis: 30_000,
        }
    }
}

impl ChainParams {
    /// Largest emission amount allowed for a block at the given chain depth.
    pub fn emission_cap(&self, depth: u64) -> u64 {
        if depth < self.halving_interval {
            self.start_emission
        } else {
            let divisor = 2 * (depth / self.halving_interval).max(1);
            self.start_emission / divisor
        }
    }
}
