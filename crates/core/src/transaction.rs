//! Transactions: canonical hashing, construction and signing.

use crate::hash::sha256_hex;
use crate::identity::{self, Identity, IdentityError};
use crate::params::EMISSION_INPUT;
use crate::time::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three transaction kinds the ledger understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Coin,
    Text,
    Emission,
}

impl TxKind {
    /// Discriminant folded into the canonical hash preimage.
    pub fn discriminant(self) -> u8 {
        match self {
            TxKind::Coin => 0,
            TxKind::Text => 1,
            TxKind::Emission => 2,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Coin => write!(f, "coin"),
            TxKind::Text => write!(f, "text"),
            TxKind::Emission => write!(f, "emission"),
        }
    }
}

/// A ledger transaction.
///
/// `hash` commits to every payload field through the canonical preimage and
/// the signature (where one is required) covers the ASCII bytes of `hash`.
/// A transaction is therefore immutable once hashed: edits are detected by
/// recomputing the hash, not by re-checking the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TxKind,
    /// Sender address; the emission tag for Emission, an author id for Text.
    pub input: String,
    /// Recipient address; a message locator for Text.
    pub output: String,
    /// Unix milliseconds at creation.
    pub timestamp: u64,
    /// Message body, empty unless Text.
    pub text: String,
    /// Transferred or minted amount, zero for Text.
    pub amount: u64,
    /// SPKI PEM of the signer, required for Coin and Emission.
    pub public_key: Option<String>,
    /// Lowercase hex SHA-256 of the canonical preimage.
    pub hash: String,
    /// Base64 RSA-PSS signature over the hash string bytes.
    pub signature: Option<String>,
}

impl Transaction {
    /// A signed coin transfer from the identity's address.
    pub fn coin(
        identity: &Identity,
        output: impl Into<String>,
        amount: u64,
    ) -> Result<Self, IdentityError> {
        let mut tx = Self {
            kind: TxKind::Coin,
            input: identity.address().to_string(),
            output: output.into(),
            timestamp: now_millis(),
            text: String::new(),
            amount,
            public_key: Some(identity.public_pem().to_string()),
            hash: String::new(),
            signature: None,
        };
        tx.seal(identity)?;
        Ok(tx)
    }

    /// An unsigned text record.
    pub fn text(
        input: impl Into<String>,
        output: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let mut tx = Self {
            kind: TxKind::Text,
            input: input.into(),
            output: output.into(),
            timestamp: now_millis(),
            text: body.into(),
            amount: 0,
            public_key: None,
            hash: String::new(),
            signature: None,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// A signed emission minting `amount` to the identity's own address.
    pub fn emission(identity: &Identity, amount: u64) -> Result<Self, IdentityError> {
        let mut tx = Self {
            kind: TxKind::Emission,
            input: EMISSION_INPUT.to_string(),
            output: identity.address().to_string(),
            timestamp: now_millis(),
            text: String::new(),
            amount,
            public_key: Some(identity.public_pem().to_string()),
            hash: String::new(),
            signature: None,
        };
        tx.seal(identity)?;
        Ok(tx)
    }

    fn seal(&mut self, identity: &Identity) -> Result<(), IdentityError> {
        self.hash = self.compute_hash();
        self.signature = Some(identity.sign(self.hash.as_bytes())?);
        Ok(())
    }

    /// Recompute the canonical hash from the payload fields.
    pub fn compute_hash(&self) -> String {
        let preimage = format!(
            "{}{}{}{}{}{}",
            self.kind.discriminant(),
            self.timestamp,
            self.input,
            self.output,
            self.text,
            self.amount
        );
        sha256_hex(preimage.as_bytes())
    }

    /// Whether this kind must carry a key and signature.
    pub fn requires_signature(&self) -> bool {
        matches!(self.kind, TxKind::Coin | TxKind::Emission)
    }

    /// Check the carried signature over the stored hash.
    ///
    /// False when the key or signature is absent or malformed. Note this
    /// says nothing about the hash matching the payload; callers recompute
    /// the hash separately.
    pub fn verify_signature(&self) -> bool {
        match (&self.public_key, &self.signature) {
            (Some(pem), Some(sig)) => identity::verify_signature(pem, self.hash.as_bytes(), sig),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn test_identity() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    #[test]
    fn test_coin_transaction_is_sealed() {
        let id = test_identity();
        let tx = Transaction::coin(id, "peer", 25).unwrap();

        assert_eq!(tx.kind, TxKind::Coin);
        assert_eq!(tx.input, id.address());
        assert_eq!(tx.hash, tx.compute_hash());
        assert!(tx.verify_signature());
    }

    #[test]
    fn test_emission_mints_to_self() {
        let id = test_identity();
        let tx = Transaction::emission(id, 40).unwrap();

        assert_eq!(tx.input, EMISSION_INPUT);
        assert_eq!(tx.output, id.address());
        assert!(tx.verify_signature());
    }

    #[test]
    fn test_text_is_unsigned() {
        let tx = Transaction::text("author", "msg:42", "hello there");

        assert_eq!(tx.kind, TxKind::Text);
        assert_eq!(tx.amount, 0);
        assert!(tx.public_key.is_none());
        assert!(tx.signature.is_none());
        assert_eq!(tx.hash, tx.compute_hash());
        assert!(!tx.verify_signature());
    }

    #[test]
    fn test_hash_covers_every_payload_field() {
        let base = Transaction::text("a", "b", "c");

        let mut changed = base.clone();
        changed.amount = 7;
        assert_ne!(changed.compute_hash(), base.compute_hash());

        let mut changed = base.clone();
        changed.output = "elsewhere".into();
        assert_ne!(changed.compute_hash(), base.compute_hash());

        let mut changed = base.clone();
        changed.timestamp += 1;
        assert_ne!(changed.compute_hash(), base.compute_hash());
    }

    #[test]
    fn test_tamper_shows_up_in_hash_not_signature() {
        let id = test_identity();
        let mut tx = Transaction::coin(id, "peer", 10).unwrap();
        tx.amount = 10_000;

        // the signature still covers the stored hash
        assert!(tx.verify_signature());
        // the stored hash no longer matches the payload
        assert_ne!(tx.hash, tx.compute_hash());
    }

    #[test]
    fn test_kind_discriminants_are_fixed() {
        assert_eq!(TxKind::Coin.discriminant(), 0);
        assert_eq!(TxKind::Text.discriminant(), 1);
        assert_eq!(TxKind::Emission.discriminant(), 2);
    }

    #[test]
    fn test_wire_roundtrip_json() {
        let id = test_identity();
        let tx = Transaction::coin(id, "peer", 3).unwrap();

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"kind\":\"coin\""));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
