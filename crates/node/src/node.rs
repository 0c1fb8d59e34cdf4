//! The mining and replication orchestrator.
//!
//! A [`Node`] runs one cycle after another: catch up with the network,
//! then race a local mining attempt against incoming peer blocks. When
//! the local attempt wins it is announced and held back for a short
//! quorum window so that rival blocks mined in the same breath can be
//! compared, earliest assembly winning.

use minibit_consensus::{
    assemble_candidate, mine, AssembleError, Linkage, MineOutcome, Validator,
};
use minibit_core::{now_millis, Block, Identity, IdentityError};
use minibit_ledger::Ledger;
use minibit_store::{ChainStore, StorageError};
use minibit_sync::{BlockSyncMode, ObservedBlock, RelayClient, Replicator, SyncError};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::settings::NodeSettings;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error("mining thread failed: {0}")]
    MiningThread(#[from] tokio::task::JoinError),
}

/// How a single mining cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A peer's block arrived and was adopted before the local attempt
    /// finished.
    PeerWon { hash: String },
    /// The local block was committed without any rival in sight.
    LocalUnopposed { hash: String },
    /// Rivals were observed and the local block was still the earliest.
    LocalConfirmed { hash: String },
    /// A rival block was assembled earlier and was adopted instead.
    PeerConfirmed { hash: String },
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::PeerWon { hash } => write!(f, "peer block {hash} adopted mid-race"),
            CycleOutcome::LocalUnopposed { hash } => {
                write!(f, "local block {hash} committed unopposed")
            }
            CycleOutcome::LocalConfirmed { hash } => write!(f, "local block {hash} elected"),
            CycleOutcome::PeerConfirmed { hash } => write!(f, "peer block {hash} elected"),
        }
    }
}

/// A long-running participant in the chain: miner, replicator and
/// answer-server rolled into one.
pub struct Node {
    identity: Arc<Identity>,
    ledger: Arc<Mutex<Ledger>>,
    replicator: Replicator,
    store: ChainStore,
    settings: NodeSettings,
    peer_count: AtomicU64,
    wins: AtomicU64,
}

impl Node {
    /// Load or create the node's identity and chain, then register with
    /// the relay.
    pub async fn connect(settings: NodeSettings) -> Result<Self, NodeError> {
        let identity = Identity::load_or_generate(&settings.key_path)?;
        info!(address = %identity.address(), "node identity ready");

        let store = ChainStore::open(&settings.store_path)?;
        let chain = store.load()?;
        if !chain.is_empty() {
            info!(height = chain.len(), "chain restored from disk");
        }
        let ledger = Arc::new(Mutex::new(Ledger::from_chain(chain)));

        let client = RelayClient::connect(settings.relay_url.clone(), settings.sync.clone()).await?;
        info!(token = %client.token(), "registered with the relay");

        let validator =
            Arc::new(Validator::new(settings.params.clone()).with_policy(settings.text_policy));
        let replicator = Replicator::new(client, ledger.clone(), validator);

        Ok(Node {
            identity: Arc::new(identity),
            ledger,
            replicator,
            store,
            settings,
            peer_count: AtomicU64::new(0),
            wins: AtomicU64::new(0),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn ledger(&self) -> &Arc<Mutex<Ledger>> {
        &self.ledger
    }

    pub fn replicator(&self) -> &Replicator {
        &self.replicator
    }

    /// Blocks this node mined and got accepted so far.
    pub fn wins(&self) -> u64 {
        self.wins.load(Ordering::Relaxed)
    }

    /// One full mining cycle: sync, race, persist.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, NodeError> {
        self.sync_up().await?;
        let outcome = self.race().await?;
        self.persist().await?;
        Ok(outcome)
    }

    /// Mine until cancelled, logging each cycle.
    pub async fn mine_loop(&self) -> Result<(), NodeError> {
        loop {
            match self.run_cycle().await {
                Ok(outcome) => info!(wins = self.wins(), "{outcome}"),
                Err(err) => {
                    warn!(error = %err, "mining cycle failed, backing off");
                    sleep(self.settings.sync.retry_delay).await;
                }
            }
        }
    }

    /// Follow the network without mining: full sync, persist, repeat.
    pub async fn watch_loop(&self) -> Result<(), NodeError> {
        loop {
            match self.replicator.full_sync().await {
                Ok(outcome) => debug!(?outcome, "watch sync finished"),
                Err(err) => warn!(error = %err, "watch sync failed"),
            }
            let stats = {
                let mut ledger = self.ledger.lock().await;
                ledger.ensure_genesis();
                ledger.stats()
            };
            debug!(
                height = stats.height,
                pending = stats.pending_transactions,
                "watch cycle finished"
            );
            if let Err(err) = self.persist().await {
                warn!(error = %err, "persisting the chain failed");
            }
            sleep(self.settings.watch_interval).await;
        }
    }

    /// Answer queued peer requests, forever.
    pub async fn answer_loop(&self) -> Result<(), NodeError> {
        loop {
            if let Err(err) = self.replicator.serve_pending().await {
                warn!(error = %err, "answering a peer request failed");
            }
            sleep(self.settings.answer_interval).await;
        }
    }

    /// Merge broadcast transactions into the mempool, forever.
    pub async fn transaction_loop(&self) -> Result<(), NodeError> {
        loop {
            match self.replicator.sync_new_transactions().await {
                Ok(added) if added > 0 => debug!(added, "transactions merged"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "transaction sync failed"),
            }
            sleep(self.settings.tx_sync_interval).await;
        }
    }

    /// Keep the cached peer count fresh, forever.
    pub async fn peer_count_loop(&self) -> Result<(), NodeError> {
        loop {
            match self.replicator.client().peer_count().await {
                Ok(num) => self.peer_count.store(num, Ordering::Relaxed),
                Err(err) => warn!(error = %err, "peer count refresh failed"),
            }
            sleep(self.settings.peer_count_interval).await;
        }
    }

    /// Catch up before racing: full sync when the tip has gone stale,
    /// then a single block pull, then make sure a chain exists at all.
    async fn sync_up(&self) -> Result<(), NodeError> {
        let stale = {
            let ledger = self.ledger.lock().await;
            match ledger.tip() {
                Some(tip) => {
                    now_millis().saturating_sub(tip.timestamp) > self.settings.stale_after_millis
                }
                None => true,
            }
        };
        if stale {
            let outcome = self.replicator.full_sync().await?;
            debug!(?outcome, "full sync finished");
        }
        self.replicator
            .sync_new_blocks(BlockSyncMode::Adopt, Linkage::Strict)
            .await?;
        if self.ledger.lock().await.ensure_genesis() {
            info!("starting from the genesis sentinel");
        }
        Ok(())
    }

    /// Race a local mining attempt against peer announcements.
    async fn race(&self) -> Result<CycleOutcome, NodeError> {
        let stop = Arc::new(AtomicBool::new(false));

        let mining = self.mine_candidate(stop.clone());
        let watching = self.observe_until_adopted();
        tokio::pin!(mining, watching);

        tokio::select! {
            peer = &mut watching => {
                stop.store(true, Ordering::Relaxed);
                let peer = peer?;
                info!(hash = %peer.block.hash, "peer block won the race");
                Ok(CycleOutcome::PeerWon { hash: peer.block.hash })
            }
            mined = &mut mining => {
                let (block, outcome) = mined?;
                match outcome {
                    MineOutcome::Found { elapsed, hashes } => {
                        info!(hash = %block.hash, hashes, ?elapsed, "block mined");
                        self.confirm(block).await
                    }
                    // the stop flag is only raised by the watching side,
                    // so a peer block is already on the way
                    MineOutcome::Stopped { .. } => {
                        let peer = (&mut watching).await?;
                        Ok(CycleOutcome::PeerWon { hash: peer.block.hash })
                    }
                }
            }
        }
    }

    /// Wait for the mempool quota, then assemble and mine on a blocking
    /// thread.
    async fn mine_candidate(
        &self,
        stop: Arc<AtomicBool>,
    ) -> Result<(Block, MineOutcome), NodeError> {
        let quota = self.settings.params.txs_per_block;
        loop {
            if self.ledger.lock().await.pending_count() >= quota {
                break;
            }
            sleep(self.settings.mempool_poll_interval).await;
        }

        let mut candidate = {
            let ledger = self.ledger.lock().await;
            assemble_candidate(&ledger, &self.identity, &self.settings.params)?
        };
        debug!(
            transactions = candidate.transactions.len(),
            bits = %candidate.bits,
            "candidate assembled"
        );

        let handle = tokio::task::spawn_blocking(move || {
            let outcome = mine(&mut candidate, &stop);
            (candidate, outcome)
        });
        Ok(handle.await?)
    }

    /// Pull blocks until one is adopted.
    async fn observe_until_adopted(&self) -> Result<ObservedBlock, NodeError> {
        loop {
            let adopted = self
                .replicator
                .sync_new_blocks(BlockSyncMode::Adopt, Linkage::Strict)
                .await?;
            if let Some(block) = adopted.into_iter().next() {
                return Ok(block);
            }
            sleep(self.settings.observe_interval).await;
        }
    }

    /// Announce a freshly mined block, watch for rivals over the quorum
    /// window and commit whichever block was assembled earliest.
    async fn confirm(&self, mut block: Block) -> Result<CycleOutcome, NodeError> {
        // the link is refreshed right before broadcast in case the tip
        // moved while the proof was being finished
        {
            let ledger = self.ledger.lock().await;
            if let Some(tip) = ledger.tip() {
                block.previous_hash = tip.hash.clone();
            }
        }
        self.replicator.announce_block(&block).await?;

        let rivals = self.quorum_observe().await?;
        let mut ledger = self.ledger.lock().await;
        match elect_earliest(&block, &rivals) {
            None => {
                ledger.strip_committed(&block);
                ledger.append(block.clone());
                self.wins.fetch_add(1, Ordering::Relaxed);
                if rivals.is_empty() {
                    Ok(CycleOutcome::LocalUnopposed { hash: block.hash })
                } else {
                    info!(rivals = rivals.len(), "local block was the earliest");
                    Ok(CycleOutcome::LocalConfirmed { hash: block.hash })
                }
            }
            Some(rival) => {
                if rival.soft_linked {
                    // the rival links below our tip, so the tip gives way
                    if let Some(popped) = ledger.pop_tip() {
                        ledger.restore_pending(&popped);
                        debug!(hash = %popped.hash, "tip unwound for an earlier rival");
                    }
                }
                ledger.strip_committed(&rival.block);
                ledger.append(rival.block.clone());
                info!(hash = %rival.block.hash, "rival block was assembled earlier");
                Ok(CycleOutcome::PeerConfirmed {
                    hash: rival.block.hash.clone(),
                })
            }
        }
    }

    /// Collect rival announcements until enough peers have been heard
    /// from or the deadline passes.
    async fn quorum_observe(&self) -> Result<Vec<ObservedBlock>, NodeError> {
        let deadline = Instant::now() + self.settings.quorum_deadline;
        let mut rivals: Vec<ObservedBlock> = Vec::new();
        loop {
            let batch = self
                .replicator
                .sync_new_blocks(BlockSyncMode::Observe, Linkage::Relaxed)
                .await?;
            rivals.extend(batch);

            let peers = self.peer_count.load(Ordering::Relaxed).max(1);
            if (rivals.len() as u64) * 100 >= peers * self.settings.quorum_ratio_percent {
                break;
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(self.settings.quorum_poll).await;
        }
        Ok(rivals)
    }

    async fn persist(&self) -> Result<(), NodeError> {
        let ledger = self.ledger.lock().await;
        self.store.save(ledger.chain())?;
        Ok(())
    }
}

/// Pick the rival assembled before the local block, if any. Earlier
/// timestamps win and the lower hash breaks ties.
fn elect_earliest<'a>(local: &Block, rivals: &'a [ObservedBlock]) -> Option<&'a ObservedBlock> {
    let mut best: Option<&ObservedBlock> = None;
    let mut best_key = (local.timestamp, local.hash.as_str());
    for rival in rivals {
        let key = (rival.block.timestamp, rival.block.hash.as_str());
        if key < best_key {
            best = Some(rival);
            best_key = key;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(timestamp: u64, hash: &str) -> Block {
        let mut block = Block::with_transactions(Vec::new());
        block.timestamp = timestamp;
        block.hash = hash.into();
        block
    }

    fn observed(timestamp: u64, hash: &str) -> ObservedBlock {
        ObservedBlock {
            block: block(timestamp, hash),
            soft_linked: false,
        }
    }

    #[test]
    fn test_local_wins_without_rivals() {
        let local = block(100, "aa");
        assert!(elect_earliest(&local, &[]).is_none());
    }

    #[test]
    fn test_earlier_rival_wins() {
        let local = block(100, "aa");
        let rivals = vec![observed(120, "bb"), observed(90, "cc")];
        let winner = elect_earliest(&local, &rivals).unwrap();
        assert_eq!(winner.block.hash, "cc");
    }

    #[test]
    fn test_local_earliest_beats_rivals() {
        let local = block(80, "aa");
        let rivals = vec![observed(90, "00"), observed(120, "bb")];
        assert!(elect_earliest(&local, &rivals).is_none());
    }

    #[test]
    fn test_timestamp_tie_breaks_on_hash() {
        let local = block(100, "bb");
        let rivals = vec![observed(100, "aa")];
        let winner = elect_earliest(&local, &rivals).unwrap();
        assert_eq!(winner.block.hash, "aa");

        let local = block(100, "aa");
        let rivals = vec![observed(100, "bb")];
        assert!(elect_earliest(&local, &rivals).is_none());
    }
}
