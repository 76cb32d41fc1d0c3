//! Transaction generators.
//!
//! A generator produces one signed transaction per call for a given worker.
//! Generators are looked up by case name in a [`GeneratorRegistry`], which
//! also records whether the case needs its worker accounts pre-funded and
//! whether it has a one-off setup transaction to submit before a fan-out.

mod short_content;
mod transfer;

pub use short_content::{
    parse_content_length, ShortContentGenerator, DEFAULT_CONTENT_LENGTH, MAX_CONTENT_LENGTH,
    SHORT_CONTENT_CASE,
};
pub use transfer::{TransferGenerator, TRANSFER_CASE};

use crate::accounts::ManifestError;
use crate::client::RpcError;
use crate::config::{ConfigError, RunConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use xbench_types::{Address, Payload, ShardIndex, Transaction, TransactionError};

/// Produces benchmark transactions.
///
/// `generate` is called concurrently and repeatedly by every worker of a
/// process. `init` runs once per process before any worker starts.
#[async_trait]
pub trait Generator: Send + Sync {
    /// One-time setup, possibly reaching the backend.
    async fn init(&mut self) -> Result<(), GeneratorError>;

    /// Produce one transaction for `worker`.
    fn generate(&self, worker: usize) -> Result<Transaction, GeneratorError>;
}

/// Builds a generator from the run configuration.
pub type GeneratorFactory = fn(&RunConfig) -> Result<Box<dyn Generator>, GeneratorError>;

/// Per-account funding amount a case needs from the split stage.
pub type FundingAmount = fn(&RunConfig) -> Result<u64, ConfigError>;

/// One-off transaction a multi-process run submits once, from the bank,
/// before any child starts.
#[derive(Debug, Clone)]
pub struct CaseSetup {
    /// Payload the bank signs and submits.
    pub payload: Payload,

    /// Configuration children run with once the setup is done.
    pub child_config: RunConfig,
}

/// Builds the setup for a run whose bank account is `bank`, or `None` if
/// the run requests no setup.
pub type SetupHook = fn(&RunConfig, &Address) -> Result<Option<CaseSetup>, GeneratorError>;

/// Registry entry for one case.
#[derive(Clone, Copy)]
pub struct CaseEntry {
    /// Constructor for the case's generator.
    pub factory: GeneratorFactory,

    /// Present when worker accounts must be funded before generation.
    pub funding: Option<FundingAmount>,

    /// Present when the case may need a one-off setup transaction.
    pub setup: Option<SetupHook>,
}

/// Mapping from case name to generator factory.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    cases: BTreeMap<&'static str, CaseEntry>,
}

impl GeneratorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in case.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            TRANSFER_CASE,
            CaseEntry {
                factory: TransferGenerator::boxed,
                funding: Some(transfer::funding_amount),
                setup: None,
            },
        );
        registry.register(
            SHORT_CONTENT_CASE,
            CaseEntry {
                factory: ShortContentGenerator::boxed,
                funding: None,
                setup: Some(short_content::deploy_setup),
            },
        );
        registry
    }

    /// Register a case, returning the entry it replaced.
    pub fn register(&mut self, name: &'static str, entry: CaseEntry) -> Option<CaseEntry> {
        self.cases.insert(name, entry)
    }

    /// Look up a case.
    pub fn get(&self, name: &str) -> Result<&CaseEntry, GeneratorError> {
        self.cases
            .get(name)
            .ok_or_else(|| GeneratorError::UnknownCase(name.to_string()))
    }

    /// Build the generator for `config.case`.
    pub fn build(&self, config: &RunConfig) -> Result<Box<dyn Generator>, GeneratorError> {
        (self.get(&config.case)?.factory)(config)
    }

    /// Registered case names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.cases.keys().copied()
    }
}

/// One RNG per worker.
///
/// Each worker only ever locks its own slot, so the locks are uncontended.
pub(crate) struct WorkerRngs(Vec<Mutex<ChaCha8Rng>>);

impl WorkerRngs {
    /// Seed `count` streams from `seed`, one per worker.
    pub fn new(count: usize, seed: u64) -> Self {
        Self(
            (0..count as u64)
                .map(|worker| seed.wrapping_add(worker * 1000))
                .map(|seed| Mutex::new(ChaCha8Rng::seed_from_u64(seed)))
                .collect(),
        )
    }

    /// Seed from the wall clock, offset by the process' first shard.
    pub fn from_clock(count: usize, first_shard: ShardIndex) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::new(count, nanos.wrapping_add(first_shard.0.wrapping_mul(1_000_003)))
    }

    /// Run `f` with `worker`'s RNG.
    pub fn with<R>(&self, worker: usize, f: impl FnOnce(&mut ChaCha8Rng) -> R) -> Option<R> {
        self.0.get(worker).map(|rng| f(&mut rng.lock()))
    }
}

/// Random alphanumeric string of `len` characters.
pub(crate) fn random_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Errors raised by generators.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown case: {0}")]
    UnknownCase(String),

    #[error("Generator used before init")]
    NotInitialized,

    #[error("Worker {worker} out of range for concurrency {concurrency}")]
    WorkerOutOfRange { worker: usize, concurrency: usize },

    #[error("Transaction build failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Funding manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Account {address} for shard {shard} missing from funding manifest")]
    Unfunded { address: Address, shard: ShardIndex },

    #[error("Failed to read contract code at {path}: {source}")]
    ReadCode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Contract deployment rejected: {0}")]
    DeployRejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_cases() {
        let registry = GeneratorRegistry::builtin();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec![SHORT_CONTENT_CASE, TRANSFER_CASE]);

        assert!(registry.get(TRANSFER_CASE).unwrap().funding.is_some());
        assert!(registry.get(SHORT_CONTENT_CASE).unwrap().funding.is_none());
        assert!(registry.get(SHORT_CONTENT_CASE).unwrap().setup.is_some());
        assert!(registry.get(TRANSFER_CASE).unwrap().setup.is_none());
    }

    #[test]
    fn test_unknown_case() {
        let registry = GeneratorRegistry::builtin();
        let config = RunConfig::new("nonexistent");
        assert!(matches!(
            registry.build(&config),
            Err(GeneratorError::UnknownCase(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn test_register_replaces_entry() {
        let mut registry = GeneratorRegistry::new();
        let entry = CaseEntry {
            factory: ShortContentGenerator::boxed,
            funding: None,
            setup: None,
        };
        assert!(registry.register("custom", entry).is_none());
        assert!(registry.register("custom", entry).is_some());

        let config = RunConfig::new("custom").with_arg("length", "32");
        assert!(registry.build(&config).is_ok());
    }

    #[test]
    fn test_worker_rngs_are_independent_streams() {
        let rngs = WorkerRngs::new(2, 7);
        let a = rngs.with(0, |rng| random_string(rng, 32)).unwrap();
        let b = rngs.with(1, |rng| random_string(rng, 32)).unwrap();

        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
        assert!(rngs.with(2, |rng| rng.gen::<u64>()).is_none());
    }
}
