//! RSA identities: keypairs, addresses, signing and verification.
//!
//! Every signing peer holds a 2048-bit RSA key. Signatures are RSA-PSS with
//! an MGF1-SHA256 mask and travel base64-encoded; public keys travel as
//! SPKI PEM strings. An address is the url-safe base64 of the SHA-256 of the
//! public key PEM, so any carried key commits to exactly one address.

use crate::hash::sha256_bytes;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// RSA modulus size for generated identities.
pub const KEY_BITS: usize = 2048;

/// Errors from key handling and signing.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("key generation failed: {0}")]
    Generation(#[from] rsa::Error),
    #[error("invalid private key pem")]
    BadPrivatePem,
    #[error("pem encoding failed: {0}")]
    PemEncode(String),
    #[error("signing failed")]
    Signing,
    #[error("key file: {0}")]
    KeyFile(#[from] std::io::Error),
}

/// A local signing identity.
pub struct Identity {
    private: RsaPrivateKey,
    public_pem: String,
    address: String,
}

impl Identity {
    /// Generate a fresh random identity.
    pub fn generate() -> Result<Self, IdentityError> {
        let mut rng = OsRng;
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)?;
        Self::from_private(private)
    }

    /// Rebuild an identity from a PKCS#8 PEM private key.
    pub fn from_private_pem(pem: &str) -> Result<Self, IdentityError> {
        let private =
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|_| IdentityError::BadPrivatePem)?;
        Self::from_private(private)
    }

    fn from_private(private: RsaPrivateKey) -> Result<Self, IdentityError> {
        let public_pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| IdentityError::PemEncode(e.to_string()))?;
        let address = derive_address(&public_pem);
        Ok(Self {
            private,
            public_pem,
            address,
        })
    }

    /// Read the identity from a PEM file, generating and persisting a new
    /// one when the file does not exist yet.
    pub fn load_or_generate(path: &Path) -> Result<Self, IdentityError> {
        if path.exists() {
            let pem = fs::read_to_string(path)?;
            return Self::from_private_pem(&pem);
        }
        let identity = Self::generate()?;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, identity.to_private_pem()?)?;
        Ok(identity)
    }

    /// Export the private key as PKCS#8 PEM.
    pub fn to_private_pem(&self) -> Result<String, IdentityError> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| IdentityError::PemEncode(e.to_string()))
    }

    /// The SPKI PEM form of the public key, as carried on the wire.
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    /// The address derived from the public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a message with RSA-PSS; the signature is returned base64-encoded.
    pub fn sign(&self, message: &[u8]) -> Result<String, IdentityError> {
        let key = SigningKey::<Sha256>::new(self.private.clone());
        let mut rng = OsRng;
        let signature = key
            .try_sign_with_rng(&mut rng, message)
            .map_err(|_| IdentityError::Signing)?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .finish()
    }
}

/// Address of a public key: url-safe base64 of the SHA-256 of its PEM form.
pub fn derive_address(public_pem: &str) -> String {
    URL_SAFE.encode(sha256_bytes(public_pem.as_bytes()))
}

/// Verify a base64 RSA-PSS signature against a SPKI PEM public key.
///
/// Malformed keys or signatures verify as false rather than erroring; the
/// caller only ever needs the yes/no answer.
pub fn verify_signature(public_pem: &str, message: &[u8], signature_b64: &str) -> bool {
    let key = match RsaPublicKey::from_public_key_pem(public_pem) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let raw = match STANDARD.decode(signature_b64) {
        Ok(raw) => raw,
        Err(_) => return false,
    };
    let signature = match Signature::try_from(raw.as_slice()) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    VerifyingKey::<Sha256>::new(key)
        .verify(message, &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn test_identity() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    fn other_identity() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    #[test]
    fn test_sign_and_verify() {
        let id = test_identity();
        let sig = id.sign(b"hello world").unwrap();
        assert!(verify_signature(id.public_pem(), b"hello world", &sig));
    }

    #[test]
    fn test_tampered_message_fails() {
        let id = test_identity();
        let sig = id.sign(b"hello").unwrap();
        assert!(!verify_signature(id.public_pem(), b"world", &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let id = test_identity();
        let sig = id.sign(b"hello").unwrap();
        assert!(!verify_signature(other_identity().public_pem(), b"hello", &sig));
    }

    #[test]
    fn test_garbage_inputs_verify_false() {
        let id = test_identity();
        assert!(!verify_signature("not a pem", b"m", "AAAA"));
        assert!(!verify_signature(id.public_pem(), b"m", "%%% not base64 %%%"));
    }

    #[test]
    fn test_address_is_stable_and_urlsafe() {
        let id = test_identity();
        assert_eq!(id.address(), derive_address(id.public_pem()));
        assert!(!id.address().contains('+'));
        assert!(!id.address().contains('/'));
        // base64 of a 32-byte digest
        assert_eq!(id.address().len(), 44);
    }

    #[test]
    fn test_private_pem_roundtrip() {
        let id = test_identity();
        let pem = id.to_private_pem().unwrap();
        let restored = Identity::from_private_pem(&pem).unwrap();
        assert_eq!(restored.address(), id.address());
        assert_eq!(restored.public_pem(), id.public_pem());
    }

    #[test]
    fn test_load_or_generate_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.pem");

        let first = Identity::load_or_generate(&path).unwrap();
        assert!(path.exists());
        let second = Identity::load_or_generate(&path).unwrap();
        assert_eq!(first.address(), second.address());
    }

    #[test]
    fn test_bad_private_pem_rejected() {
        assert!(matches!(
            Identity::from_private_pem("garbage"),
            Err(IdentityError::BadPrivatePem)
        ));
    }
}
