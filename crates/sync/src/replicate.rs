//! Chain and mempool replication on top of the relay client.
//!
//! The replicator owns the seen-hash set that keeps a node from
//! re-importing its own broadcasts, and the answered-uuid set that keeps
//! it from answering the same peer request twice. All ledger access goes
//! through one async mutex shared with the caller.

use crate::client::{RelayClient, SyncError};
use minibit_consensus::{resolve, BlockOutcome, Linkage, ResolveReason, Validator};
use minibit_core::{now_millis, Block, Transaction};
use minibit_ledger::Ledger;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Whether an incremental block sync adopts what it finds or only reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSyncMode {
    /// Append the first acceptable block to the chain.
    Adopt,
    /// Collect every acceptable candidate, leaving the chain untouched.
    Observe,
}

/// A peer block that passed validation during an observe-mode sync.
#[derive(Debug, Clone)]
pub struct ObservedBlock {
    pub block: Block,
    pub soft_linked: bool,
}

/// What a full sync did to the local chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullSyncOutcome {
    Replaced { height: usize, reason: ResolveReason },
    NoAnswers,
}

pub struct Replicator {
    client: RelayClient,
    ledger: Arc<Mutex<Ledger>>,
    validator: Arc<Validator>,
    seen: Mutex<HashSet<String>>,
    answered: Mutex<HashSet<String>>,
}

impl Replicator {
    pub fn new(client: RelayClient, ledger: Arc<Mutex<Ledger>>, validator: Arc<Validator>) -> Self {
        Self {
            client,
            ledger,
            validator,
            seen: Mutex::new(HashSet::new()),
            answered: Mutex::new(HashSet::new()),
        }
    }

    pub fn client(&self) -> &RelayClient {
        &self.client
    }

    /// Ask every peer for its full chain and adopt the resolver's winner.
    ///
    /// No usable answer leaves the local chain untouched; peers that answer
    /// garbage or an empty chain are skipped.
    pub async fn full_sync(&self) -> Result<FullSyncOutcome, SyncError> {
        let uuid = self.client.request_update("blockchain").await?;
        sleep(self.client.config().settle_delay).await;

        let answers = self.poll_answers(&uuid).await?;
        let candidates = parse_chain_answers(&answers);
        if candidates.is_empty() {
            debug!("full sync brought no usable chains");
            return Ok(FullSyncOutcome::NoAnswers);
        }

        match resolve(&candidates) {
            Some((chain, reason)) => {
                let height = chain.len();
                let mut ledger = self.ledger.lock().await;
                ledger.replace_chain(chain);
                info!(height, %reason, "adopted peer chain");
                Ok(FullSyncOutcome::Replaced { height, reason })
            }
            None => Ok(FullSyncOutcome::NoAnswers),
        }
    }

    /// Pull freshly relayed blocks and run them through validation.
    ///
    /// Stale blocks (outside the freshness window), our own broadcasts and
    /// blocks already on the chain are dropped before validation. In adopt
    /// mode the first accepted block is appended, its transactions stripped
    /// from the mempool, and the sync stops there.
    pub async fn sync_new_blocks(
        &self,
        mode: BlockSyncMode,
        linkage: Linkage,
    ) -> Result<Vec<ObservedBlock>, SyncError> {
        let uuid = self.client.request_update("newblock").await?;
        let answers = self.client.check(&uuid).await?.unwrap_or_default();
        if answers.is_empty() {
            return Ok(Vec::new());
        }

        let now = now_millis();
        let fresh_window = self.validator.params().fresh_window_millis;
        let mut accepted = Vec::new();
        let mut ledger = self.ledger.lock().await;

        for answer in answers {
            let block: Block = match serde_json::from_value(answer) {
                Ok(block) => block,
                Err(err) => {
                    warn!(error = %err, "discarding unparseable block answer");
                    continue;
                }
            };
            if now.abs_diff(block.timestamp) > fresh_window {
                debug!(hash = %block.hash, "ignoring stale relayed block");
                continue;
            }
            if !self.seen.lock().await.insert(block.hash.clone()) {
                continue;
            }
            if ledger.contains_block(&block.hash) {
                continue;
            }

            match self.validator.validate_block(&block, &ledger, linkage).await? {
                BlockOutcome::Accepted { soft_linked } => {
                    info!(hash = %block.hash, soft_linked, "relayed block accepted");
                    match mode {
                        BlockSyncMode::Adopt => {
                            ledger.strip_committed(&block);
                            ledger.append(block.clone());
                            accepted.push(ObservedBlock { block, soft_linked });
                            break;
                        }
                        BlockSyncMode::Observe => {
                            accepted.push(ObservedBlock { block, soft_linked });
                        }
                    }
                }
                BlockOutcome::Rejected(reason) => {
                    debug!(hash = %block.hash, %reason, "relayed block rejected");
                }
            }
        }
        Ok(accepted)
    }

    /// Pull freshly relayed transactions into the mempool.
    ///
    /// Ones already pending or confirmed are skipped; the rest validate
    /// against current balances before merging. Returns how many merged.
    pub async fn sync_new_transactions(&self) -> Result<usize, SyncError> {
        let uuid = self.client.request_update("newtransac").await?;
        let answers = self.client.check(&uuid).await?.unwrap_or_default();
        if answers.is_empty() {
            return Ok(0);
        }

        let mut merged = 0;
        let mut ledger = self.ledger.lock().await;
        for answer in answers {
            let tx: Transaction = match serde_json::from_value(answer) {
                Ok(tx) => tx,
                Err(err) => {
                    warn!(error = %err, "discarding unparseable transaction answer");
                    continue;
                }
            };
            if ledger.has_pending(&tx.hash) || ledger.is_confirmed(&tx.hash) {
                continue;
            }
            match self.validator.validate_transaction(&tx, &ledger).await {
                Ok(()) => {
                    debug!(hash = %tx.hash, "merged relayed transaction");
                    if ledger.add_pending(tx) {
                        merged += 1;
                    }
                }
                Err(reason) => {
                    debug!(hash = %tx.hash, %reason, "relayed transaction rejected");
                }
            }
        }
        Ok(merged)
    }

    /// Answer one pending full-sync request, if any. Returns whether a
    /// request was served.
    pub async fn serve_pending(&self) -> Result<bool, SyncError> {
        let request = match self.client.fetch_pending().await? {
            Some(request) => request,
            None => return Ok(false),
        };
        if !self.answered.lock().await.insert(request.uuid.clone()) {
            return Ok(false);
        }
        if request.target != "blockchain" {
            debug!(target = %request.target, "ignoring pending request with unknown target");
            return Ok(false);
        }

        let body = {
            let ledger = self.ledger.lock().await;
            serde_json::to_value(ledger.chain())?
        };
        self.client.send_answer(&request.uuid, &body).await?;
        info!(uuid = %request.uuid, "answered chain request");
        Ok(true)
    }

    /// Propagate a block of our own and remember its hash so the next
    /// incremental sync does not re-import the echo.
    pub async fn announce_block(&self, block: &Block) -> Result<(), SyncError> {
        self.client.propagate_block(block).await?;
        self.seen.lock().await.insert(block.hash.clone());
        Ok(())
    }

    async fn poll_answers(&self, uuid: &str) -> Result<Vec<serde_json::Value>, SyncError> {
        let config = self.client.config();
        for _ in 0..config.poll_attempts {
            if let Some(answers) = self.client.check(uuid).await? {
                return Ok(answers);
            }
            sleep(config.poll_interval).await;
        }
        debug!(%uuid, "poll window closed without answers");
        Ok(Vec::new())
    }
}

/// Parse chain answers, dropping garbage and empty chains.
fn parse_chain_answers(answers: &[serde_json::Value]) -> Vec<Vec<Block>> {
    let mut chains = Vec::new();
    for answer in answers {
        match serde_json::from_value::<Vec<Block>>(answer.clone()) {
            Ok(chain) if chain.is_empty() => {}
            Ok(chain) => chains.push(chain),
            Err(err) => warn!(error = %err, "discarding unparseable chain answer"),
        }
    }
    chains
}
