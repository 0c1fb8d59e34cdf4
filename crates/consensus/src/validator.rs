//! Transaction and block validation rules.
//!
//! Rejections are ordinary outcomes carrying a distinct reason; only the
//! self-parent invariant escalates to an error, because a block listing
//! itself as its parent means a bug somewhere, not a bad peer.

use crate::difficulty::{cmp_targets, current_epoch, meets_target, most_frequent_bits};
use async_trait::async_trait;
use minibit_core::{now_millis, Block, BlockError, ChainParams, Transaction, TxKind};
use minibit_ledger::Ledger;
use num_bigint::BigUint;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// External authenticity check for text transactions.
///
/// Implementations may retry internally; the Err string is surfaced
/// verbatim as the rejection reason.
#[async_trait]
pub trait TextChecker: Send + Sync {
    async fn check(&self, tx: &Transaction) -> Result<(), String>;
}

/// What to do with a text transaction when no checker is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextPolicy {
    /// Wave it through.
    #[default]
    AllowUnchecked,
    /// Refuse it.
    RejectUnchecked,
}

/// How a block may attach to the local chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linkage {
    /// Must link to the tip.
    #[default]
    Strict,
    /// May instead link to the block just below the tip.
    Relaxed,
}

/// Why a transaction was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxRejection {
    #[error("hash does not match payload")]
    HashMismatch,
    #[error("missing public key or signature")]
    MissingSignature,
    #[error("amount below minimum")]
    AmountBelowMinimum,
    #[error("insufficient balance (required {required}, available {available})")]
    Overspend { required: u64, available: i64 },
    #[error("signature verification failed")]
    BadSignature,
    #[error("emission above cap (amount {amount}, cap {cap})")]
    EmissionAboveCap { amount: u64, cap: u64 },
    #[error("text check failed: {0}")]
    TextRejected(String),
    #[error("no text checker configured")]
    UncheckedText,
}

/// Why a block was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlockRejection {
    #[error("bits below the most frequent target of the epoch")]
    BitsBelowEpoch,
    #[error("hash does not match header")]
    HashMismatch,
    #[error("hash does not meet the declared target")]
    TargetMissed,
    #[error("does not link to the previous block")]
    BrokenLinkage,
    #[error("timestamp too far in the future")]
    TimestampInFuture,
    #[error("timestamp not after the linked block")]
    TimestampNotMonotonic,
    #[error("bits is not a hex integer")]
    MalformedBits,
    #[error("merkle root does not match transactions")]
    MerkleMismatch,
    #[error("invalid transaction: {0}")]
    BadTransaction(TxRejection),
    #[error("expected exactly one emission, found {0}")]
    WrongEmissionCount(usize),
    #[error("not enough transactions")]
    TooFewTransactions,
    #[error("emission above the cap at this depth")]
    EmissionAboveCap,
}

/// Outcome of validating a block against the local chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Accepted { soft_linked: bool },
    Rejected(BlockRejection),
}

impl BlockOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BlockOutcome::Accepted { .. })
    }
}

/// The consensus rule set, shared by miners and the sync layer.
pub struct Validator {
    params: ChainParams,
    policy: TextPolicy,
    checker: Option<Arc<dyn TextChecker>>,
}

impl Validator {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            policy: TextPolicy::default(),
            checker: None,
        }
    }

    pub fn with_checker(mut self, checker: Arc<dyn TextChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn with_policy(mut self, policy: TextPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Validate a transaction against the current ledger state.
    pub async fn validate_transaction(
        &self,
        tx: &Transaction,
        ledger: &Ledger,
    ) -> Result<(), TxRejection> {
        if tx.compute_hash() != tx.hash {
            return Err(TxRejection::HashMismatch);
        }

        match tx.kind {
            TxKind::Coin => {
                if tx.public_key.is_none() || tx.signature.is_none() {
                    return Err(TxRejection::MissingSignature);
                }
                if tx.amount < 1 {
                    return Err(TxRejection::AmountBelowMinimum);
                }
                let available = ledger.balance(&tx.input);
                if available < tx.amount as i64 {
                    return Err(TxRejection::Overspend {
                        required: tx.amount,
                        available,
                    });
                }
                if !tx.verify_signature() {
                    return Err(TxRejection::BadSignature);
                }
                Ok(())
            }
            TxKind::Emission => {
                if tx.public_key.is_none() || tx.signature.is_none() {
                    return Err(TxRejection::MissingSignature);
                }
                if tx.amount < 1 {
                    return Err(TxRejection::AmountBelowMinimum);
                }
                let cap = self.params.emission_cap(ledger.depth());
                if tx.amount > cap {
                    return Err(TxRejection::EmissionAboveCap {
                        amount: tx.amount,
                        cap,
                    });
                }
                if !tx.verify_signature() {
                    return Err(TxRejection::BadSignature);
                }
                Ok(())
            }
            TxKind::Text => match &self.checker {
                Some(checker) => checker
                    .check(tx)
                    .await
                    .map_err(TxRejection::TextRejected),
                None => match self.policy {
                    TextPolicy::AllowUnchecked => {
                        warn!(hash = %tx.hash, "text transaction accepted unchecked");
                        Ok(())
                    }
                    TextPolicy::RejectUnchecked => Err(TxRejection::UncheckedText),
                },
            },
        }
    }

    /// Validate a block against the local chain, in rule order, stopping at
    /// the first failure. `Err` is reserved for the self-parent invariant.
    pub async fn validate_block(
        &self,
        block: &Block,
        ledger: &Ledger,
        linkage: Linkage,
    ) -> Result<BlockOutcome, BlockError> {
        block.ensure_not_self_parented()?;

        // 2. the declared target may not undercut what the epoch mined at
        if let Some(frequent) = most_frequent_bits(current_epoch(ledger.chain(), &self.params)) {
            if cmp_targets(&block.bits, &frequent) == Ordering::Less {
                return Ok(BlockOutcome::Rejected(BlockRejection::BitsBelowEpoch));
            }
        }

        // 3. the stored hash must be the hash of the header
        if block.compute_hash() != block.hash {
            return Ok(BlockOutcome::Rejected(BlockRejection::HashMismatch));
        }

        // 4. proof of work
        if !meets_target(&block.hash, &block.bits) {
            return Ok(BlockOutcome::Rejected(BlockRejection::TargetMissed));
        }

        // 5. linkage to the tip, or one below it in relaxed mode
        let tip = match ledger.tip() {
            Some(tip) => tip,
            None => return Ok(BlockOutcome::Rejected(BlockRejection::BrokenLinkage)),
        };
        let (parent, soft_linked) = if block.previous_hash == tip.hash {
            (tip, false)
        } else {
            match ledger.nth_from_tip(1) {
                Some(below) if linkage == Linkage::Relaxed && block.previous_hash == below.hash => {
                    (below, true)
                }
                _ => return Ok(BlockOutcome::Rejected(BlockRejection::BrokenLinkage)),
            }
        };

        // 6. sane timestamps relative to now and the linked block
        if block.timestamp > now_millis() + self.params.max_future_drift_millis {
            return Ok(BlockOutcome::Rejected(BlockRejection::TimestampInFuture));
        }
        if block.timestamp <= parent.timestamp {
            return Ok(BlockOutcome::Rejected(BlockRejection::TimestampNotMonotonic));
        }

        // 7. the target must actually be a hex integer
        if BigUint::parse_bytes(block.bits.as_bytes(), 16).is_none() {
            return Ok(BlockOutcome::Rejected(BlockRejection::MalformedBits));
        }

        // 8. merkle root
        if block.compute_merkle_root() != block.merkle_root {
            return Ok(BlockOutcome::Rejected(BlockRejection::MerkleMismatch));
        }

        // 9. every transaction, and exactly one emission among them
        for tx in &block.transactions {
            if let Err(reason) = self.validate_transaction(tx, ledger).await {
                return Ok(BlockOutcome::Rejected(BlockRejection::BadTransaction(
                    reason,
                )));
            }
        }
        let emissions = block.emission_count();
        if emissions != 1 {
            return Ok(BlockOutcome::Rejected(BlockRejection::WrongEmissionCount(
                emissions,
            )));
        }

        // 10. an emission alone does not make a block
        if block.transactions.len() <= 1 {
            return Ok(BlockOutcome::Rejected(BlockRejection::TooFewTransactions));
        }

        // 11. emission amounts within the halving schedule
        let cap = self.params.emission_cap(ledger.depth());
        for tx in &block.transactions {
            if tx.kind == TxKind::Emission && tx.amount > cap {
                return Ok(BlockOutcome::Rejected(BlockRejection::EmissionAboveCap));
            }
        }

        Ok(BlockOutcome::Accepted { soft_linked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minibit_core::Identity;
    use std::sync::OnceLock;

    fn test_identity() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    fn validator() -> Validator {
        Validator::new(ChainParams::default())
    }

    fn funded_ledger(address: &str, amount: u64) -> Ledger {
        let mut grant = Transaction {
            kind: TxKind::Coin,
            input: "faucet".into(),
            output: address.into(),
            timestamp: 1,
            text: String::new(),
            amount,
            public_key: None,
            hash: String::new(),
            signature: None,
        };
        grant.hash = grant.compute_hash();

        let mut ledger = Ledger::new();
        ledger.ensure_genesis();
        let mut block = Block::with_transactions(vec![grant]);
        block.hash = "funding".into();
        ledger.append(block);
        ledger
    }

    struct FixedChecker(Result<(), String>);

    #[async_trait]
    impl TextChecker for FixedChecker {
        async fn check(&self, _tx: &Transaction) -> Result<(), String> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_valid_coin_transaction() {
        let id = test_identity();
        let ledger = funded_ledger(id.address(), 100);
        let tx = Transaction::coin(id, "peer", 40).unwrap();

        assert!(validator().validate_transaction(&tx, &ledger).await.is_ok());
    }

    #[tokio::test]
    async fn test_coin_overspend_rejected() {
        let id = test_identity();
        let ledger = funded_ledger(id.address(), 10);
        let tx = Transaction::coin(id, "peer", 40).unwrap();

        assert!(matches!(
            validator().validate_transaction(&tx, &ledger).await,
            Err(TxRejection::Overspend {
                required: 40,
                available: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_coin_zero_amount_rejected() {
        let id = test_identity();
        let ledger = funded_ledger(id.address(), 10);
        let tx = Transaction::coin(id, "peer", 0).unwrap();

        assert_eq!(
            validator().validate_transaction(&tx, &ledger).await,
            Err(TxRejection::AmountBelowMinimum)
        );
    }

    #[tokio::test]
    async fn test_coin_without_signature_rejected() {
        let id = test_identity();
        let ledger = funded_ledger(id.address(), 100);
        let mut tx = Transaction::coin(id, "peer", 5).unwrap();
        tx.signature = None;

        assert_eq!(
            validator().validate_transaction(&tx, &ledger).await,
            Err(TxRejection::MissingSignature)
        );
    }

    #[tokio::test]
    async fn test_tampered_amount_rejected_as_hash_mismatch() {
        let id = test_identity();
        let ledger = funded_ledger(id.address(), 100);
        let mut tx = Transaction::coin(id, "peer", 5).unwrap();
        tx.amount = 50;

        assert_eq!(
            validator().validate_transaction(&tx, &ledger).await,
            Err(TxRejection::HashMismatch)
        );
    }

    #[tokio::test]
    async fn test_forged_signature_rejected() {
        let id = test_identity();
        let ledger = funded_ledger(id.address(), 100);
        let mut tx = Transaction::coin(id, "peer", 5).unwrap();
        tx.signature = Some("AAAA".into());

        assert_eq!(
            validator().validate_transaction(&tx, &ledger).await,
            Err(TxRejection::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_emission_within_cap_accepted() {
        let id = test_identity();
        let mut ledger = Ledger::new();
        ledger.ensure_genesis();
        let tx = Transaction::emission(id, 40).unwrap();

        assert!(validator().validate_transaction(&tx, &ledger).await.is_ok());
    }

    #[tokio::test]
    async fn test_emission_above_cap_rejected() {
        let id = test_identity();
        let mut ledger = Ledger::new();
        ledger.ensure_genesis();
        let tx = Transaction::emission(id, 41).unwrap();

        assert_eq!(
            validator().validate_transaction(&tx, &ledger).await,
            Err(TxRejection::EmissionAboveCap {
                amount: 41,
                cap: 40
            })
        );
    }

    #[tokio::test]
    async fn test_text_passes_without_checker_by_default() {
        let ledger = Ledger::new();
        let tx = Transaction::text("author", "msg:1", "hi");

        assert!(validator().validate_transaction(&tx, &ledger).await.is_ok());
    }

    #[tokio::test]
    async fn test_text_rejected_under_strict_policy() {
        let ledger = Ledger::new();
        let tx = Transaction::text("author", "msg:1", "hi");
        let strict = validator().with_policy(TextPolicy::RejectUnchecked);

        assert_eq!(
            strict.validate_transaction(&tx, &ledger).await,
            Err(TxRejection::UncheckedText)
        );
    }

    #[tokio::test]
    async fn test_text_checker_verdict_propagates() {
        let ledger = Ledger::new();
        let tx = Transaction::text("author", "msg:1", "hi");

        let ok = validator().with_checker(Arc::new(FixedChecker(Ok(()))));
        assert!(ok.validate_transaction(&tx, &ledger).await.is_ok());

        let bad = validator().with_checker(Arc::new(FixedChecker(Err("not the author".into()))));
        assert_eq!(
            bad.validate_transaction(&tx, &ledger).await,
            Err(TxRejection::TextRejected("not the author".into()))
        );
    }

    // block validation

    /// A three-block chain whose epoch target is tiny, so test blocks can
    /// declare their own hash as the target without undercutting the epoch.
    fn permissive_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.ensure_genesis();
        let mut b1 = Block::with_transactions(vec![]);
        b1.timestamp = 1;
        b1.bits = "1".into();
        b1.previous_hash = "0".into();
        b1.hash = "b1".into();
        let mut b2 = Block::with_transactions(vec![]);
        b2.timestamp = 2;
        b2.bits = "1".into();
        b2.previous_hash = "b1".into();
        b2.hash = "b2".into();
        ledger.append(b1);
        ledger.append(b2);
        ledger
    }

    /// A block that the default validator accepts on `permissive_ledger`.
    fn acceptable_block(ledger: &Ledger) -> Block {
        let id = test_identity();
        let emission = Transaction::emission(id, 40).unwrap();
        let note = Transaction::text("author", "msg:1", "payload");

        let mut block = Block::with_transactions(vec![emission, note]);
        block.previous_hash = ledger.tip().unwrap().hash.clone();
        block.bits = "f".repeat(64);
        block.merkle_root = block.compute_merkle_root();
        block.hash = block.compute_hash();
        block
    }

    #[tokio::test]
    async fn test_block_accepted() {
        let ledger = permissive_ledger();
        let block = acceptable_block(&ledger);

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(outcome, BlockOutcome::Accepted { soft_linked: false });
    }

    #[tokio::test]
    async fn test_self_parented_block_aborts() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.previous_hash = block.hash.clone();

        assert!(validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_bits_below_epoch_rejected() {
        let mut ledger = Ledger::new();
        ledger.ensure_genesis();
        let block = {
            let mut b = acceptable_block(&ledger);
            b.bits = "aa".into();
            b.hash = b.compute_hash();
            b
        };

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::BitsBelowEpoch)
        );
    }

    #[tokio::test]
    async fn test_tampered_hash_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.hash = "f".repeat(63);

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(outcome, BlockOutcome::Rejected(BlockRejection::HashMismatch));
    }

    #[tokio::test]
    async fn test_hash_above_target_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        // a one-digit target admits no hash, and matches the epoch exactly
        block.bits = "1".into();
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(outcome, BlockOutcome::Rejected(BlockRejection::TargetMissed));
    }

    #[tokio::test]
    async fn test_broken_linkage_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.previous_hash = "elsewhere".into();
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::BrokenLinkage)
        );
    }

    #[tokio::test]
    async fn test_relaxed_linkage_reports_soft_link() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.previous_hash = "b1".into();
        block.hash = block.compute_hash();

        let strict = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(strict, BlockOutcome::Rejected(BlockRejection::BrokenLinkage));

        let relaxed = validator()
            .validate_block(&block, &ledger, Linkage::Relaxed)
            .await
            .unwrap();
        assert_eq!(relaxed, BlockOutcome::Accepted { soft_linked: true });
    }

    #[tokio::test]
    async fn test_future_timestamp_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.timestamp = now_millis() + 8_000_000;
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::TimestampInFuture)
        );
    }

    #[tokio::test]
    async fn test_stale_timestamp_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        // the linked tip carries timestamp 2
        block.timestamp = 2;
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::TimestampNotMonotonic)
        );
    }

    #[tokio::test]
    async fn test_malformed_bits_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        // long enough to pass the ordering checks, but not hex
        block.bits = "zz".repeat(35);
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::MalformedBits)
        );
    }

    #[tokio::test]
    async fn test_merkle_mismatch_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.merkle_root = "f".repeat(64);
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::MerkleMismatch)
        );
    }

    #[tokio::test]
    async fn test_bad_inner_transaction_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.transactions[1].text = "edited after hashing".into();
        block.merkle_root = block.compute_merkle_root();
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::BadTransaction(TxRejection::HashMismatch))
        );
    }

    #[tokio::test]
    async fn test_missing_emission_rejected() {
        let ledger = permissive_ledger();
        let mut block = acceptable_block(&ledger);
        block.transactions = vec![
            Transaction::text("author", "msg:1", "one"),
            Transaction::text("author", "msg:2", "two"),
        ];
        block.merkle_root = block.compute_merkle_root();
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::WrongEmissionCount(0))
        );
    }

    #[tokio::test]
    async fn test_emission_alone_rejected() {
        let ledger = permissive_ledger();
        let id = test_identity();
        let mut block = acceptable_block(&ledger);
        block.transactions = vec![Transaction::emission(id, 40).unwrap()];
        block.merkle_root = block.compute_merkle_root();
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::TooFewTransactions)
        );
    }

    #[tokio::test]
    async fn test_overfed_emission_rejected_inside_block() {
        let ledger = permissive_ledger();
        let id = test_identity();
        let mut block = acceptable_block(&ledger);
        block.transactions[0] = Transaction::emission(id, 400).unwrap();
        block.merkle_root = block.compute_merkle_root();
        block.hash = block.compute_hash();

        let outcome = validator()
            .validate_block(&block, &ledger, Linkage::Strict)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(BlockRejection::BadTransaction(
                TxRejection::EmissionAboveCap {
                    amount: 400,
                    cap: 40
                }
            ))
        );
    }
}
