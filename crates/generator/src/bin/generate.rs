//! xbench Transaction Generator CLI
//!
//! Pre-generates signed benchmark transactions into `<case>.dat.NNNN` shard files.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use xbench_generator::config::{RunConfig, DEFAULT_HOST};
use xbench_generator::orchestrator::{Orchestrator, ProcessPool};
use xbench_generator::runner::run_local;
use xbench_generator::workloads::{GeneratorRegistry, SHORT_CONTENT_CASE, TRANSFER_CASE};

#[derive(Parser)]
#[command(name = "xbench-generate")]
#[command(about = "Synthetic transaction workload generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate short-content contract invocations
    Contract {
        /// Backend address (ip:port)
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Number of transactions across the whole run
        #[arg(short, long, default_value = "1000000")]
        total: u64,

        /// Workers per process
        #[arg(short, long, default_value = "20")]
        concurrency: usize,

        /// Output directory for shard files
        #[arg(short, long, default_value = "./data/evidence")]
        output: PathBuf,

        /// Content length in characters (0 or above 3000 uses 64)
        #[arg(short, long, default_value = "200")]
        length: String,

        /// Number of processes
        #[arg(long, default_value = "1")]
        process: usize,

        /// Child index (set by the orchestrator)
        #[arg(long, default_value = "0")]
        child: usize,

        /// Deploy the contract before generating
        #[arg(long, action = ArgAction::Set, default_value = "false")]
        deploy: bool,

        /// Contract bytecode to deploy
        #[arg(long)]
        code_path: Option<PathBuf>,
    },

    /// Generate value transfers between funded accounts
    Tx {
        /// Backend address (ip:port)
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Balance given to each worker account
        #[arg(short, long, default_value = "100000000")]
        amount: u64,

        /// Amount moved by each transfer
        #[arg(long)]
        transfer_amount: Option<u64>,

        /// Number of transactions across the whole run
        #[arg(short, long, default_value = "1000000")]
        total: u64,

        /// Workers per process
        #[arg(short, long, default_value = "20")]
        concurrency: usize,

        /// Output directory for shard files
        #[arg(short, long, default_value = "./data/transaction")]
        output: PathBuf,

        /// Number of processes
        #[arg(long, default_value = "1")]
        process: usize,

        /// Child index (set by the orchestrator)
        #[arg(long, default_value = "0")]
        child: usize,
    },
}

impl Commands {
    /// Subcommand name children are re-invoked with.
    fn subcommand(&self) -> &'static str {
        match self {
            Commands::Contract { .. } => "contract",
            Commands::Tx { .. } => "tx",
        }
    }

    fn into_config(self) -> RunConfig {
        match self {
            Commands::Contract {
                host,
                total,
                concurrency,
                output,
                length,
                process,
                child,
                deploy,
                code_path,
            } => {
                let mut config = RunConfig::new(SHORT_CONTENT_CASE)
                    .with_host(host)
                    .with_total(total)
                    .with_concurrency(concurrency)
                    .with_output(output)
                    .with_process(process)
                    .with_child(child)
                    .with_arg("length", length);
                if deploy {
                    config = config.with_arg("deploy", "true");
                }
                if let Some(path) = code_path {
                    config = config.with_arg("code_path", path.display().to_string());
                }
                config
            }

            Commands::Tx {
                host,
                amount,
                transfer_amount,
                total,
                concurrency,
                output,
                process,
                child,
            } => {
                let mut config = RunConfig::new(TRANSFER_CASE)
                    .with_host(host)
                    .with_total(total)
                    .with_concurrency(concurrency)
                    .with_output(output)
                    .with_process(process)
                    .with_child(child)
                    .with_arg("amount", amount.to_string());
                if let Some(transfer_amount) = transfer_amount {
                    config = config.with_arg("transfer_amount", transfer_amount.to_string());
                }
                config
            }
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let subcommand = command.subcommand();
    let config = command.into_config();
    let registry = GeneratorRegistry::builtin();

    if config.is_orchestrator() {
        let pool = ProcessPool::current_exe(subcommand)
            .context("Failed to prepare child processes")?;
        Orchestrator::new(pool)
            .run(&config, &registry)
            .await
            .with_context(|| format!("Multi-process {} run failed", config.case))?;
    } else {
        run_local(&config, &registry).await.with_context(|| {
            format!("{} generation failed in child {}", config.case, config.child)
        })?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(cli.command).await {
        Ok(()) => {
            info!("Done");
            Ok(())
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Run failed");
            Err(e)
        }
    }
}
