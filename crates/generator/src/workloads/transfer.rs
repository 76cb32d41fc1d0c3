//! Value-transfer workload generator.

use super::{Generator, GeneratorError, WorkerRngs};
use crate::accounts::{accounts_for_shards, FundedAccount, FundingManifest};
use crate::config::{ConfigError, RunConfig};
use async_trait::async_trait;
use rand::Rng;
use std::path::PathBuf;
use tracing::{info, warn};
use xbench_types::{Address, KeyPair, Payload, ShardIndex, Transaction};

/// Case name of the transfer workload.
pub const TRANSFER_CASE: &str = "transaction";

/// Amount moved by each transfer unless `transfer_amount` is given.
pub const DEFAULT_TRANSFER_AMOUNT: u64 = 10;

/// Per-account funding amount, from the required `amount` argument.
pub(crate) fn funding_amount(config: &RunConfig) -> Result<u64, ConfigError> {
    parse_positive(config, "amount")
}

fn parse_positive(config: &RunConfig, name: &'static str) -> Result<u64, ConfigError> {
    let value = config.required_arg(name)?;
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidArgument {
            name,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidArgument {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Generates transfers from each worker's funded account to random recipients.
pub struct TransferGenerator {
    /// Balance each worker account was funded with.
    amount: u64,

    /// Amount moved by one transfer.
    transfer_amount: u64,

    /// Output directory, where the funding manifest lives.
    output: PathBuf,

    /// Shard owned by worker 0 of this process.
    first_shard: ShardIndex,

    concurrency: usize,

    /// One account per worker, populated by `init`.
    accounts: Vec<FundedAccount>,

    rngs: WorkerRngs,
}

impl TransferGenerator {
    /// Create a transfer generator.
    pub fn new(config: &RunConfig) -> Result<Self, GeneratorError> {
        let amount = funding_amount(config)?;
        let transfer_amount = if config.arg("transfer_amount").is_some() {
            parse_positive(config, "transfer_amount")?
        } else {
            DEFAULT_TRANSFER_AMOUNT.min(amount)
        };
        if transfer_amount > amount {
            return Err(ConfigError::InvalidArgument {
                name: "transfer_amount",
                value: transfer_amount.to_string(),
                reason: format!("exceeds funded amount {}", amount),
            }
            .into());
        }

        // Each worker signs up to its quota of transfers from one funded balance
        let needed = config.per_worker_quota().saturating_mul(transfer_amount);
        if needed > amount {
            return Err(ConfigError::InvalidArgument {
                name: "amount",
                value: amount.to_string(),
                reason: format!(
                    "{} transfers of {} per worker need a balance of {}",
                    config.per_worker_quota(),
                    transfer_amount,
                    needed
                ),
            }
            .into());
        }

        let first_shard = config.shard_index(0);

        Ok(Self {
            amount,
            transfer_amount,
            output: config.output.clone(),
            first_shard,
            concurrency: config.concurrency,
            accounts: Vec::new(),
            rngs: WorkerRngs::from_clock(config.concurrency, first_shard),
        })
    }

    /// Factory for the registry.
    pub fn boxed(config: &RunConfig) -> Result<Box<dyn Generator>, GeneratorError> {
        Ok(Box::new(Self::new(config)?))
    }

    /// Worker accounts, one per worker once initialized.
    pub fn accounts(&self) -> &[FundedAccount] {
        &self.accounts
    }

    fn random_recipient(&self, worker: usize) -> Option<Address> {
        self.rngs.with(worker, |rng| {
            let seed: [u8; 32] = rng.gen();
            Address::from_public_key(&KeyPair::from_seed(&seed).public_key())
        })
    }
}

#[async_trait]
impl Generator for TransferGenerator {
    async fn init(&mut self) -> Result<(), GeneratorError> {
        let accounts = accounts_for_shards(self.first_shard, self.concurrency);

        let manifest_path = FundingManifest::path_in(&self.output);
        match FundingManifest::read(&manifest_path)? {
            Some(manifest) => {
                let funded = manifest.addresses();
                for (worker, account) in accounts.iter().enumerate() {
                    if !funded.contains(&account.address) {
                        return Err(GeneratorError::Unfunded {
                            address: account.address.clone(),
                            shard: ShardIndex(self.first_shard.0 + worker as u64),
                        });
                    }
                }
                info!(
                    accounts = accounts.len(),
                    first_shard = %self.first_shard,
                    "Worker accounts found in funding manifest"
                );
            }
            None => {
                warn!(
                    path = %manifest_path.display(),
                    amount = self.amount,
                    "No funding manifest; worker accounts are assumed to be funded"
                );
            }
        }

        self.accounts = accounts;
        Ok(())
    }

    fn generate(&self, worker: usize) -> Result<Transaction, GeneratorError> {
        if self.accounts.is_empty() {
            return Err(GeneratorError::NotInitialized);
        }
        let from = self
            .accounts
            .get(worker)
            .ok_or(GeneratorError::WorkerOutOfRange {
                worker,
                concurrency: self.concurrency,
            })?;
        let to = self
            .random_recipient(worker)
            .ok_or(GeneratorError::WorkerOutOfRange {
                worker,
                concurrency: self.concurrency,
            })?;

        let tx = Transaction::sign(
            &from.keypair,
            from.next_nonce(),
            Payload::Transfer {
                to,
                amount: self.transfer_amount,
            },
        )?;
        Ok(tx)
    }
}
