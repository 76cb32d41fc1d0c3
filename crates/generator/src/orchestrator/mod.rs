//! Multi-process fan-out.
//!
//! With `process > 1` the run is split across child processes, each one a
//! fresh invocation of the same executable with `--process 1` and its own
//! `--child` index. Cases that need funded accounts are funded once here,
//! and one-off setup transactions (contract deployment) are submitted once
//! here, before any child starts.

use crate::accounts::{FundedAccount, FundingManifest, ManifestError};
use crate::client::{Backend, RpcClient, RpcError};
use crate::config::{ConfigError, RunConfig};
use crate::engine::format_elapsed;
use crate::funding::{FundingSplitter, SplitError};
use crate::workloads::{GeneratorError, GeneratorRegistry};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info};
use xbench_types::{ShardIndex, Transaction, TransactionError};

/// Slice of the run assigned to one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildPlan {
    pub child: usize,
    /// Transactions this child is asked for.
    pub total: u64,
    pub first_shard: ShardIndex,
    pub concurrency: usize,
}

impl ChildPlan {
    /// Shard indices owned by this child, in worker order.
    pub fn shard_indices(&self) -> Vec<ShardIndex> {
        (0..self.concurrency)
            .map(|worker| ShardIndex::new(self.child, self.concurrency, worker))
            .collect()
    }
}

/// Split `config.total` across `config.process` children.
///
/// The first `total % process` children take one extra transaction so the
/// slices sum to `total`.
pub fn plan_children(config: &RunConfig) -> Vec<ChildPlan> {
    let process = config.process.max(1) as u64;
    let base = config.total / process;
    let remainder = config.total % process;

    (0..process)
        .map(|child| ChildPlan {
            child: child as usize,
            total: base + u64::from(child < remainder),
            first_shard: ShardIndex::new(child as usize, config.concurrency, 0),
            concurrency: config.concurrency,
        })
        .collect()
}

/// Launches child processes and waits for all of them.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    program: PathBuf,
    /// Arguments placed before each child's own arguments.
    prefix_args: Vec<String>,
}

impl ProcessPool {
    pub fn new(program: impl Into<PathBuf>, prefix_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args,
        }
    }

    /// Pool re-invoking the running executable with `subcommand`.
    pub fn current_exe(subcommand: &str) -> Result<Self, OrchestratorError> {
        let program = std::env::current_exe().map_err(OrchestratorError::CurrentExe)?;
        Ok(Self::new(program, vec![subcommand.to_string()]))
    }

    /// Spawn every child and wait for them concurrently.
    ///
    /// Returns on the first child that fails to spawn or exits unsuccessfully;
    /// children still running at that point are killed.
    pub async fn run_all(
        &self,
        children: Vec<(usize, Vec<String>)>,
    ) -> Result<(), OrchestratorError> {
        let mut running = Vec::with_capacity(children.len());
        for (child, args) in children {
            let process = Command::new(&self.program)
                .args(&self.prefix_args)
                .args(&args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| OrchestratorError::Spawn { child, source })?;
            info!(child, pid = process.id(), "Spawned child process");
            running.push((child, process));
        }

        let mut waits: FuturesUnordered<_> = running
            .into_iter()
            .map(|(child, mut process)| async move { (child, process.wait().await) })
            .collect();

        while let Some((child, status)) = waits.next().await {
            let status = status.map_err(|source| OrchestratorError::Wait { child, source })?;
            if !status.success() {
                error!(child, %status, "Child process failed");
                return Err(OrchestratorError::ChildFailed { child, status });
            }
            info!(child, remaining = waits.len(), "Child process finished");
        }
        Ok(())
    }
}

/// Runs a multi-process generation.
pub struct Orchestrator {
    pool: ProcessPool,
}

impl Orchestrator {
    pub fn new(pool: ProcessPool) -> Self {
        Self { pool }
    }

    /// Fund and set up (if needed) and fan out, submitting setup
    /// transactions to `config.host`.
    pub async fn run(
        &self,
        config: &RunConfig,
        registry: &GeneratorRegistry,
    ) -> Result<(), OrchestratorError> {
        self.run_with_backend(config, registry, RpcClient::new(&config.host)?)
            .await
    }

    /// Fund and set up (if needed) through `backend` and fan out.
    ///
    /// Every bank transaction is submitted here, once, so children never
    /// sign with the bank account.
    pub async fn run_with_backend<B: Backend>(
        &self,
        config: &RunConfig,
        registry: &GeneratorRegistry,
        backend: B,
    ) -> Result<(), OrchestratorError> {
        config.validate()?;
        let entry = *registry.get(&config.case)?;
        let plans = plan_children(config);

        // Reject bad generator arguments before any funds move
        registry.build(&config.child_config(0, plans[0].total))?;

        let start = Instant::now();
        let bank = FundedAccount::bank();
        let setup = match entry.setup {
            Some(hook) => hook(config, &bank.address)?,
            None => None,
        };

        if let Some(funding) = entry.funding {
            let amount = funding(config)?;
            sync_nonce(&backend, &bank).await?;
            let accounts = FundingSplitter::new(&backend)
                .split(&bank, amount, config.total_workers())
                .await?;

            std::fs::create_dir_all(&config.output).map_err(|source| {
                OrchestratorError::CreateDir {
                    path: config.output.clone(),
                    source,
                }
            })?;
            FundingManifest::from_accounts(&accounts, amount)
                .write(&FundingManifest::path_in(&config.output))?;
        }

        let child_config = match setup {
            Some(setup) => {
                // The split already advanced the bank nonce locally
                if entry.funding.is_none() {
                    sync_nonce(&backend, &bank).await?;
                }
                let tx = Transaction::sign(&bank.keypair, bank.next_nonce(), setup.payload)?;
                let result = backend.submit_transaction(&tx).await?;
                if !result.is_success() {
                    return Err(OrchestratorError::SetupRejected(
                        result.error.unwrap_or_else(|| "rejected".to_string()),
                    ));
                }
                info!(case = %config.case, nonce = tx.nonce, hash = %tx.hash, "Submitted setup");
                setup.child_config
            }
            None => config.clone(),
        };

        for plan in &plans {
            info!(
                child = plan.child,
                total = plan.total,
                first_shard = %plan.first_shard,
                "Planned child process"
            );
        }

        let children = plans
            .iter()
            .map(|plan| (plan.child, child_config.child_args(plan.child, plan.total)))
            .collect();
        self.pool.run_all(children).await?;

        info!(
            case = %config.case,
            processes = config.process,
            elapsed = %format_elapsed(start.elapsed()),
            "All child processes finished"
        );
        Ok(())
    }
}

/// Continue the bank's nonce from where the backend left it.
async fn sync_nonce<B: Backend>(backend: &B, bank: &FundedAccount) -> Result<(), RpcError> {
    let nonce = backend.next_nonce(&bank.address).await?;
    debug!(address = %bank.address, nonce, "Synced bank nonce");
    bank.set_nonce(nonce);
    Ok(())
}

/// Orchestrator errors.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Generator setup failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Funding split failed: {0}")]
    Split(#[from] SplitError),

    #[error("Setup transaction build failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Setup transaction rejected: {0}")]
    SetupRejected(String),

    #[error("Funding manifest failed: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot locate current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("Failed to spawn child {child}: {source}")]
    Spawn {
        child: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for child {child}: {source}")]
    Wait {
        child: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Child {child} exited with {status}")]
    ChildFailed { child: usize, status: ExitStatus },
}
