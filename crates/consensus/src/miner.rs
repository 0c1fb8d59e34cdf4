//! Candidate assembly and the proof-of-work search.

use crate::difficulty::{calc_bits, meets_target};
use minibit_core::{sha256_hex, Block, ChainParams, Identity, IdentityError, Transaction};
use minibit_ledger::Ledger;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("cannot assemble a candidate on an empty chain")]
    EmptyChain,
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// How a mining run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    /// A nonce cleared the target and was written into the block.
    Found { elapsed: Duration, hashes: u64 },
    /// The stop flag was raised first.
    Stopped { elapsed: Duration },
}

/// Build the next candidate on top of the current tip.
///
/// The emission rides first, then up to `txs_per_block` pending
/// transactions. Hash and nonce stay empty until [`mine`] fills them in.
pub fn assemble_candidate(
    ledger: &Ledger,
    identity: &Identity,
    params: &ChainParams,
) -> Result<Block, AssembleError> {
    let tip = ledger.tip().ok_or(AssembleError::EmptyChain)?;

    let emission = Transaction::emission(identity, params.emission_cap(ledger.depth()))?;
    let mut transactions = vec![emission];
    transactions.extend(ledger.pending_for_mining(params.txs_per_block));

    let mut block = Block::with_transactions(transactions);
    block.previous_hash = tip.hash.clone();
    block.bits = calc_bits(ledger.chain(), &tip.bits, params, block.timestamp);
    block.merkle_root = block.compute_merkle_root();
    Ok(block)
}

/// Search nonces until the hash clears the target or `stop` is raised.
///
/// Nonces are drawn at random so competing miners do not walk the same
/// sequence. The flag is polled every attempt, which keeps the abort
/// latency at one hash.
pub fn mine(block: &mut Block, stop: &AtomicBool) -> MineOutcome {
    let blob = block.blob();
    let started = Instant::now();
    let mut rng = rand::thread_rng();
    let mut hashes: u64 = 0;

    loop {
        if stop.load(Ordering::Relaxed) {
            return MineOutcome::Stopped {
                elapsed: started.elapsed(),
            };
        }

        let nonce = rng.gen::<u32>() as u64;
        let hash = sha256_hex(format!("{}{}", blob, nonce).as_bytes());
        hashes += 1;

        if meets_target(&hash, &block.bits) {
            block.nonce = nonce;
            block.hash = hash;
            return MineOutcome::Found {
                elapsed: started.elapsed(),
                hashes,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minibit_core::{TxKind, GENESIS_BITS};
    use std::sync::OnceLock;

    fn test_identity() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    #[test]
    fn test_mine_finds_nonce_under_easy_target() {
        let mut block = Block::with_transactions(vec![]);
        block.previous_hash = "0".into();
        block.bits = "f".repeat(64);

        let outcome = mine(&mut block, &AtomicBool::new(false));

        assert!(matches!(outcome, MineOutcome::Found { hashes, .. } if hashes >= 1));
        assert_eq!(block.hash, block.compute_hash());
        assert!(meets_target(&block.hash, &block.bits));
    }

    #[test]
    fn test_mine_respects_stop_flag() {
        let mut block = Block::with_transactions(vec![]);
        block.previous_hash = "0".into();
        // no 256-bit hash goes below 1, so only the flag can end this run
        block.bits = "1".into();

        let outcome = mine(&mut block, &AtomicBool::new(true));

        assert!(matches!(outcome, MineOutcome::Stopped { .. }));
        assert!(block.hash.is_empty());
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_assemble_candidate_shape() {
        let id = test_identity();
        let params = ChainParams::default();
        let mut ledger = Ledger::new();
        ledger.ensure_genesis();
        ledger.add_pending(Transaction::text("author", "msg:1", "one"));
        ledger.add_pending(Transaction::text("author", "msg:2", "two"));

        let block = assemble_candidate(&ledger, id, &params).unwrap();

        assert_eq!(block.transactions.len(), 3);
        assert_eq!(block.transactions[0].kind, TxKind::Emission);
        assert_eq!(block.transactions[0].amount, 40);
        assert_eq!(block.previous_hash, "0");
        assert_eq!(block.bits, GENESIS_BITS);
        assert_eq!(block.merkle_root, block.compute_merkle_root());
        assert!(block.hash.is_empty());
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_assemble_caps_pending_transactions() {
        let id = test_identity();
        let params = ChainParams::default();
        let mut ledger = Ledger::new();
        ledger.ensure_genesis();
        for i in 0..7 {
            ledger.add_pending(Transaction::text("author", &format!("msg:{}", i), "x"));
        }

        let block = assemble_candidate(&ledger, id, &params).unwrap();

        // one emission plus txs_per_block from the pool
        assert_eq!(block.transactions.len(), 1 + params.txs_per_block);
    }

    #[test]
    fn test_assemble_needs_a_chain() {
        let ledger = Ledger::new();
        let err = assemble_candidate(&ledger, test_identity(), &ChainParams::default());
        assert!(matches!(err, Err(AssembleError::EmptyChain)));
    }
}
