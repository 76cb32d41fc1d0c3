//! Ed25519 key pairs and signatures used to sign workload transactions.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::fmt;

/// An Ed25519 key pair for signing.
#[derive(Clone)]
pub struct KeyPair(ed25519_dalek::SigningKey);

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        KeyPair(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Generate a keypair from a seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        KeyPair(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message).to_bytes())
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({:?})", self.public_key())
    }
}

/// An Ed25519 public key (32 bytes).
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(#[serde_as(as = "Hex")] [u8; 32]);

impl PublicKey {
    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        use ed25519_dalek::Verifier;
        let pk = match ed25519_dalek::VerifyingKey::from_bytes(&self.0) {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        pk.verify(message, &sig).is_ok()
    }

    /// Get bytes as slice reference.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// An Ed25519 signature (64 bytes).
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(#[serde_as(as = "Hex")] [u8; 64]);

impl Signature {
    /// Create a zero/placeholder signature for testing.
    pub fn zero() -> Self {
        Signature([0u8; 64])
    }

    /// Get signature as byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &hex::encode(self.0)[..16])
    }
}
