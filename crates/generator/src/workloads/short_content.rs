//! Short-content contract workload.
//!
//! Every transaction invokes the content-storing method of a deployed wasm
//! contract with a randomized title and a random body of configurable length.

use super::{random_string, CaseSetup, Generator, GeneratorError, WorkerRngs};
use crate::accounts::{accounts_for_shards, FundedAccount};
use crate::client::{Backend, RpcClient};
use crate::config::{ConfigError, RunConfig};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;
use xbench_types::{Address, Hash, Payload, ShardIndex, Transaction};

/// Case name of the short-content workload.
pub const SHORT_CONTENT_CASE: &str = "short_content";

/// Content length used when the requested length is out of range.
pub const DEFAULT_CONTENT_LENGTH: usize = 64;

/// Largest content the contract accepts.
pub const MAX_CONTENT_LENGTH: usize = 3000;

const DEFAULT_MODULE: &str = "wasm";
const DEFAULT_METHOD: &str = "storeShortContent";
const DEFAULT_CODE_PATH: &str = "data/contract/short_content.wasm";
const DEFAULT_USER_ID: &str = "xbench";

/// Parse the `length` argument.
///
/// Unparsable values are an error; `0` and anything above
/// [`MAX_CONTENT_LENGTH`] fall back to [`DEFAULT_CONTENT_LENGTH`].
pub fn parse_content_length(value: &str) -> Result<usize, ConfigError> {
    let n = value
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidArgument {
            name: "length",
            value: value.to_string(),
            reason: e.to_string(),
        })?;

    if n == 0 || n > MAX_CONTENT_LENGTH as u64 {
        Ok(DEFAULT_CONTENT_LENGTH)
    } else {
        Ok(n as usize)
    }
}

/// Generates contract invocations carrying random content.
pub struct ShortContentGenerator {
    length: usize,
    module: String,
    contract: String,
    method: String,
    user_id: String,

    host: String,
    deploy: bool,
    code_path: PathBuf,

    first_shard: ShardIndex,
    concurrency: usize,
    accounts: Vec<FundedAccount>,
    rngs: WorkerRngs,
}

impl ShortContentGenerator {
    /// Create a short-content generator.
    pub fn new(config: &RunConfig) -> Result<Self, GeneratorError> {
        let length = parse_content_length(config.required_arg("length")?)?;

        let deploy = match config.arg("deploy") {
            None => false,
            Some(v) => v.parse::<bool>().map_err(|e| ConfigError::InvalidArgument {
                name: "deploy",
                value: v.to_string(),
                reason: e.to_string(),
            })?,
        };

        let first_shard = config.shard_index(0);

        Ok(Self {
            length,
            module: config.arg("module_name").unwrap_or(DEFAULT_MODULE).to_string(),
            contract: config
                .arg("contract_name")
                .unwrap_or(SHORT_CONTENT_CASE)
                .to_string(),
            method: config.arg("method_name").unwrap_or(DEFAULT_METHOD).to_string(),
            user_id: config.arg("user_id").unwrap_or(DEFAULT_USER_ID).to_string(),
            host: config.host.clone(),
            deploy,
            code_path: PathBuf::from(config.arg("code_path").unwrap_or(DEFAULT_CODE_PATH)),
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

    /// Whether this process deploys the contract in `init`.
    pub fn deploys(&self) -> bool {
        self.deploy
    }

    /// Effective content length.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Contract deployment payload created by `creator`.
    pub fn deploy_payload(&self, creator: &Address) -> Result<Payload, GeneratorError> {
        let code = std::fs::read(&self.code_path).map_err(|source| GeneratorError::ReadCode {
            path: self.code_path.clone(),
            source,
        })?;

        let mut args = BTreeMap::new();
        args.insert("creator".to_string(), creator.to_string());

        Ok(Payload::DeployContract {
            module: self.module.clone(),
            name: self.contract.clone(),
            code,
            args,
        })
    }

    /// Deploy the contract bytecode from the bank account through `backend`.
    ///
    /// The bank nonce is taken from the backend, so repeated runs against
    /// the same backend do not reuse it.
    pub async fn deploy_with<B: Backend>(&self, backend: &B) -> Result<Hash, GeneratorError> {
        let creator = FundedAccount::bank();
        let payload = self.deploy_payload(&creator.address)?;
        creator.set_nonce(backend.next_nonce(&creator.address).await?);
        let tx = Transaction::sign(&creator.keypair, creator.next_nonce(), payload)?;

        let result = backend.submit_transaction(&tx).await?;
        if !result.is_success() {
            return Err(GeneratorError::DeployRejected(
                result.error.unwrap_or_else(|| "rejected".to_string()),
            ));
        }

        info!(
            contract = %self.contract,
            nonce = tx.nonce,
            hash = %tx.hash,
            "Deployed contract"
        );
        Ok(tx.hash)
    }

    fn invoke_args(&self, worker: usize, topic: String) -> Option<BTreeMap<String, String>> {
        self.rngs.with(worker, |rng| {
            let mut args = BTreeMap::new();
            args.insert("user_id".to_string(), self.user_id.clone());
            args.insert("topic".to_string(), topic);
            args.insert(
                "title".to_string(),
                format!("title_{}_{}", self.length, random_string(rng, 16)),
            );
            args.insert("content".to_string(), random_string(rng, self.length));
            args
        })
    }
}

/// Registry setup hook: with `deploy` set, the bank deploys the contract
/// once and children run with `deploy` turned off.
pub(crate) fn deploy_setup(
    config: &RunConfig,
    bank: &Address,
) -> Result<Option<CaseSetup>, GeneratorError> {
    let generator = ShortContentGenerator::new(config)?;
    if !generator.deploys() {
        return Ok(None);
    }
    Ok(Some(CaseSetup {
        payload: generator.deploy_payload(bank)?,
        child_config: config.clone().with_arg("deploy", "false"),
    }))
}

#[async_trait]
impl Generator for ShortContentGenerator {
    async fn init(&mut self) -> Result<(), GeneratorError> {
        if self.deploy {
            self.deploy_with(&RpcClient::new(&self.host)?).await?;
        }
        self.accounts = accounts_for_shards(self.first_shard, self.concurrency);
        Ok(())
    }

    fn generate(&self, worker: usize) -> Result<Transaction, GeneratorError> {
        if self.accounts.is_empty() {
            return Err(GeneratorError::NotInitialized);
        }
        let out_of_range = GeneratorError::WorkerOutOfRange {
            worker,
            concurrency: self.concurrency,
        };
        let from = match self.accounts.get(worker) {
            Some(account) => account,
            None => return Err(out_of_range),
        };
        let args = match self.invoke_args(worker, from.address.to_string()) {
            Some(args) => args,
            None => return Err(out_of_range),
        };

        let tx = Transaction::sign(
            &from.keypair,
            from.next_nonce(),
            Payload::InvokeContract {
                module: self.module.clone(),
                contract: self.contract.clone(),
                method: self.method.clone(),
                args,
            },
        )?;
        Ok(tx)
    }
}
