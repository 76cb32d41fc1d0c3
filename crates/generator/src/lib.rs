//! xbench Transaction Generator
//!
//! A library and CLI tool for pre-generating signed benchmark transactions
//! into sharded JSON-lines files.
//!
//! # Modules
//!
//! - [`accounts`]: Deterministic worker accounts and the funding manifest
//! - [`client`]: RPC client for setup transactions (funding split, contract deploy)
//! - [`config`]: Run configuration
//! - [`engine`]: Concurrent worker pool and progress counter
//! - [`funding`]: Funding split of the bank account into worker accounts
//! - [`orchestrator`]: Multi-process fan-out
//! - [`runner`]: Single-process generation run
//! - [`shard`]: Shard file writers
//! - [`workloads`]: Generator trait, registry and built-in cases

pub mod accounts;
pub mod client;
pub mod config;
pub mod engine;
pub mod funding;
pub mod orchestrator;
pub mod runner;
pub mod shard;
pub mod workloads;

#[cfg(test)]
mod testing;

pub use accounts::{FundedAccount, FundingManifest};
pub use client::{Backend, RpcClient};
pub use config::{ConfigError, RunConfig};
pub use engine::{Engine, EngineError, EngineReport, ProgressCounter};
pub use funding::{FundingSplitter, SplitError};
pub use orchestrator::{Orchestrator, OrchestratorError, ProcessPool};
pub use runner::{run_local, RunError};
pub use shard::{ShardWriter, TxSink};
pub use workloads::{Generator, GeneratorError, GeneratorRegistry};
