//! Tunable timings and locations for a running node.

use minibit_consensus::TextPolicy;
use minibit_core::ChainParams;
use minibit_sync::SyncConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a [`Node`](crate::Node) needs before it starts: where the
/// relay lives, where its files go, and how eagerly its loops poll.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Base url of the relay broker.
    pub relay_url: String,
    /// PEM file holding the node's RSA key, created on first start.
    pub key_path: PathBuf,
    /// Directory for the chain database.
    pub store_path: PathBuf,
    /// Consensus parameters, shared with every peer.
    pub params: ChainParams,
    /// Retry and polling behaviour of the relay client.
    pub sync: SyncConfig,
    /// How text transactions are treated when no checker is installed.
    pub text_policy: TextPolicy,
    /// A full re-sync is forced when the tip is older than this.
    pub stale_after_millis: u64,
    /// Pause between mempool checks while waiting for enough transactions.
    pub mempool_poll_interval: Duration,
    /// Pause between block pulls on the observing side of a mining race.
    pub observe_interval: Duration,
    /// How long a freshly mined block waits for rival announcements.
    pub quorum_deadline: Duration,
    /// Pause between rival pulls inside the quorum window.
    pub quorum_poll: Duration,
    /// Share of peers, in percent, whose blocks must have been seen for
    /// the quorum window to close early.
    pub quorum_ratio_percent: u64,
    /// Pause between answering rounds for queued peer requests.
    pub answer_interval: Duration,
    /// Pause between mempool merges from the relay.
    pub tx_sync_interval: Duration,
    /// Pause between peer-count refreshes.
    pub peer_count_interval: Duration,
    /// Pause between full syncs in watch mode.
    pub watch_interval: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        NodeSettings {
            relay_url: "http://127.0.0.1:9000".into(),
            key_path: PathBuf::from("./data/identity.pem"),
            store_path: PathBuf::from("./data/chain"),
            params: ChainParams::default(),
            sync: SyncConfig::default(),
            text_policy: TextPolicy::default(),
            stale_after_millis: 60_000,
            mempool_poll_interval: Duration::from_millis(500),
            observe_interval: Duration::from_secs(1),
            quorum_deadline: Duration::from_secs(5),
            quorum_poll: Duration::from_millis(500),
            quorum_ratio_percent: 51,
            answer_interval: Duration::from_secs(2),
            tx_sync_interval: Duration::from_millis(500),
            peer_count_interval: Duration::from_secs(3),
            watch_interval: Duration::from_secs(10),
        }
    }
}
