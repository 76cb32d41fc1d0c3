//! Account management for transaction generation.
//!
//! Accounts are derived deterministically from seeds so that a child process
//! can rebuild exactly the accounts the orchestrator funded. The bank account
//! uses a reserved seed; worker accounts are keyed by their global shard index.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use xbench_types::{Address, KeyPair, ShardIndex};

/// Seed of the bank account that funds every worker account.
pub const BANK_SEED: u64 = 0;

/// First seed used for worker accounts. Seeds below are reserved.
pub const WORKER_SEED_BASE: u64 = 100;

/// File name of the funding manifest inside the output directory.
pub const FUNDING_MANIFEST_FILE: &str = "funding.toml";

/// A funded account that can sign transactions.
///
/// Uses an atomic nonce for thread-safe concurrent transaction generation.
#[derive(Clone, Debug)]
pub struct FundedAccount {
    /// The Ed25519 keypair for signing transactions.
    pub keypair: KeyPair,

    /// The address owned by the keypair.
    pub address: Address,

    /// Nonce counter for transaction signing (shared across clones).
    nonce: Arc<AtomicU64>,
}

impl FundedAccount {
    /// Create an account from a seed.
    pub fn from_seed(seed: u64) -> Self {
        // Spread the seed across all chunks so small seeds still differ everywhere
        let mut seed_bytes = [0u8; 32];
        for (i, chunk) in seed_bytes.chunks_mut(8).enumerate() {
            let varied = seed.wrapping_add(i as u64);
            chunk.copy_from_slice(&varied.to_le_bytes());
        }
        seed_bytes[0..8].copy_from_slice(&seed.to_le_bytes());

        let keypair = KeyPair::from_seed(&seed_bytes);
        let address = Address::from_public_key(&keypair.public_key());

        Self {
            keypair,
            address,
            nonce: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The bank account holding the balance that gets split.
    pub fn bank() -> Self {
        Self::from_seed(BANK_SEED)
    }

    /// The worker account owning a shard.
    pub fn for_shard(shard: ShardIndex) -> Self {
        Self::from_seed(WORKER_SEED_BASE + shard.0)
    }

    /// Get the next nonce and increment atomically.
    pub fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Set the nonce value, e.g. to resume from the backend's view.
    pub fn set_nonce(&self, value: u64) {
        self.nonce.store(value, Ordering::SeqCst);
    }
}

/// Worker accounts for a contiguous range of shard indices.
pub fn accounts_for_shards(first: ShardIndex, count: usize) -> Vec<FundedAccount> {
    (0..count as u64)
        .map(|offset| FundedAccount::for_shard(ShardIndex(first.0 + offset)))
        .collect()
}

/// One funded account recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingEntry {
    pub shard: ShardIndex,
    pub address: Address,
    pub balance: u64,
}

/// Record of the accounts funded by the split stage.
///
/// Written by the orchestrator into the output directory so child processes
/// can confirm that their accounts were funded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingManifest {
    #[serde(default)]
    pub accounts: Vec<FundingEntry>,
}

impl FundingManifest {
    /// Build a manifest for accounts funded in shard order starting at shard 0.
    pub fn from_accounts(accounts: &[FundedAccount], balance: u64) -> Self {
        let accounts = accounts
            .iter()
            .enumerate()
            .map(|(i, account)| FundingEntry {
                shard: ShardIndex(i as u64),
                address: account.address.clone(),
                balance,
            })
            .collect();
        Self { accounts }
    }

    /// Path of the manifest inside an output directory.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(FUNDING_MANIFEST_FILE)
    }

    /// Addresses recorded in the manifest.
    pub fn addresses(&self) -> HashSet<&Address> {
        self.accounts.iter().map(|e| &e.address).collect()
    }

    /// Write the manifest as TOML.
    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        let mut contents = String::from("# Accounts funded by the split stage\n\n");
        contents.push_str(&toml::to_string(self)?);
        std::fs::write(path, contents).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), accounts = self.accounts.len(), "Wrote funding manifest");
        Ok(())
    }

    /// Read a manifest, returning `None` if the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ManifestError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Some(toml::from_str(&contents)?))
    }
}

/// Errors reading or writing the funding manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest encoding failed: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Manifest parsing failed: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_seed_deterministic() {
        let a = FundedAccount::from_seed(123);
        let b = FundedAccount::from_seed(123);
        let c = FundedAccount::from_seed(124);

        assert_eq!(a.address, b.address);
        assert_ne!(a.address, c.address);
    }

    #[test]
    fn test_worker_accounts_distinct_from_bank() {
        let bank = FundedAccount::bank();
        let accounts = accounts_for_shards(ShardIndex(0), 50);

        let addresses: HashSet<_> = accounts.iter().map(|a| a.address.clone()).collect();
        assert_eq!(addresses.len(), 50);
        assert!(!addresses.contains(&bank.address));
    }

    #[test]
    fn test_accounts_for_shards_matches_for_shard() {
        let accounts = accounts_for_shards(ShardIndex(40), 20);
        assert_eq!(
            accounts[0].address,
            FundedAccount::for_shard(ShardIndex(40)).address
        );
        assert_eq!(
            accounts[19].address,
            FundedAccount::for_shard(ShardIndex(59)).address
        );
    }

    #[test]
    fn test_nonce_shared_across_clones() {
        let account = FundedAccount::from_seed(7);
        let clone = account.clone();

        assert_eq!(account.next_nonce(), 0);
        assert_eq!(clone.next_nonce(), 1);
        assert_eq!(account.next_nonce(), 2);

        clone.set_nonce(10);
        assert_eq!(account.next_nonce(), 10);
    }

    #[test]
    fn test_manifest_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = FundingManifest::path_in(dir.path());
        let accounts = accounts_for_shards(ShardIndex(0), 3);

        let manifest = FundingManifest::from_accounts(&accounts, 1000);
        manifest.write(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("[[accounts]]").count(), 3);

        let loaded = FundingManifest::read(&path).unwrap().unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.addresses().contains(&accounts[2].address));
    }

    #[test]
    fn test_manifest_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = FundingManifest::read(&FundingManifest::path_in(dir.path())).unwrap();
        assert!(loaded.is_none());
    }
}
