//! Domain-specific identifier types.

use crate::{Hash, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account address, derived from the owner's public key.
///
/// The address is the hex encoding of the first 20 bytes of the Blake3 hash
/// of the public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Number of hash bytes kept in an address.
    pub const BYTES: usize = 20;

    /// Derive the address owned by a public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let hash = Hash::from_bytes(public_key.as_bytes());
        Address(hex::encode(&hash.as_bytes()[..Self::BYTES]))
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique index of an output shard within a run.
///
/// Computed as `child * concurrency + worker`, so indices never collide
/// across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardIndex(pub u64);

impl ShardIndex {
    /// Shard index owned by `worker` in process `child`.
    pub fn new(child: usize, concurrency: usize, worker: usize) -> Self {
        ShardIndex((child * concurrency + worker) as u64)
    }
}

impl fmt::Display for ShardIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    #[test]
    fn test_address_is_stable_per_key() {
        let keypair = KeyPair::from_seed(&[1u8; 32]);
        let a1 = Address::from_public_key(&keypair.public_key());
        let a2 = Address::from_public_key(&keypair.public_key());

        assert_eq!(a1, a2);
        assert_eq!(a1.as_str().len(), Address::BYTES * 2);

        let other = KeyPair::from_seed(&[2u8; 32]);
        assert_ne!(a1, Address::from_public_key(&other.public_key()));
    }

    #[test]
    fn test_shard_index_offsets_by_child() {
        assert_eq!(ShardIndex::new(0, 20, 0), ShardIndex(0));
        assert_eq!(ShardIndex::new(2, 20, 0), ShardIndex(40));
        assert_eq!(ShardIndex::new(2, 20, 19), ShardIndex(59));
        assert_eq!(ShardIndex(7).to_string(), "0007");
        assert_eq!(ShardIndex(12345).to_string(), "12345");
    }
}
