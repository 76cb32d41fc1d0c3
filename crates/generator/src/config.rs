//! Run configuration shared by the orchestrator, the engine and generators.

use std::collections::BTreeMap;
use std::path::PathBuf;
use xbench_types::ShardIndex;

/// Over-generation factor applied to the even per-worker split, as a ratio.
///
/// Each shard carries ~10% more records than `total / concurrency` so that
/// downstream consumers can discard some and still hit the nominal volume.
pub const OVER_GENERATION_NUMERATOR: u64 = 11;
pub const OVER_GENERATION_DENOMINATOR: u64 = 10;

/// Default backend address.
pub const DEFAULT_HOST: &str = "127.0.0.1:37101";

/// Configuration for a generation run.
///
/// Immutable once validated; workers share it read-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Registry name of the generator, also the shard file prefix.
    pub case: String,

    /// Backend address (`ip:port`).
    pub host: String,

    /// Run-wide target for a top-level invocation, per-process slice for a child.
    pub total: u64,

    /// Number of workers per process.
    pub concurrency: usize,

    /// Directory receiving shard files.
    pub output: PathBuf,

    /// Number of processes. `1` runs generation in this process.
    pub process: usize,

    /// Index of this process among its siblings.
    pub child: usize,

    /// Generator-specific arguments.
    pub args: BTreeMap<String, String>,
}

impl RunConfig {
    /// Create a new configuration for a case.
    pub fn new(case: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            host: DEFAULT_HOST.to_string(),
            total: 1_000_000,
            concurrency: 20,
            output: PathBuf::from("./data"),
            process: 1,
            child: 0,
            args: BTreeMap::new(),
        }
    }

    /// Set the backend address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the target transaction count.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    /// Set the number of workers per process.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the output directory.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Set the process count.
    pub fn with_process(mut self, process: usize) -> Self {
        self.process = process;
        self
    }

    /// Set the child index.
    pub fn with_child(mut self, child: usize) -> Self {
        self.child = child;
        self
    }

    /// Add a generator-specific argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.case.is_empty() {
            return Err(ConfigError::EmptyCase);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.process == 0 {
            return Err(ConfigError::ZeroProcess);
        }
        if self.process > 1 && self.child != 0 {
            return Err(ConfigError::ChildOfFanout {
                child: self.child,
                process: self.process,
            });
        }
        Ok(())
    }

    /// Whether this invocation fans out into child processes.
    pub fn is_orchestrator(&self) -> bool {
        self.process > 1
    }

    /// Number of transactions each worker of this process must produce.
    ///
    /// `floor((total / concurrency) * 1.1)`, with the even split truncated
    /// first.
    pub fn per_worker_quota(&self) -> u64 {
        if self.concurrency == 0 {
            return 0;
        }
        let base = u128::from(self.total / self.concurrency as u64);
        let quota = base * u128::from(OVER_GENERATION_NUMERATOR)
            / u128::from(OVER_GENERATION_DENOMINATOR);
        u64::try_from(quota).unwrap_or(u64::MAX)
    }

    /// Global shard index of a local worker.
    pub fn shard_index(&self, worker: usize) -> ShardIndex {
        ShardIndex::new(self.child, self.concurrency, worker)
    }

    /// Total number of worker accounts across every process of the run.
    pub fn total_workers(&self) -> usize {
        self.concurrency * self.process
    }

    /// Look up a generator argument.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    /// Look up a required generator argument.
    pub fn required_arg(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.arg(key).ok_or(ConfigError::MissingArgument(key))
    }

    /// Configuration of one child process running `total` transactions.
    pub fn child_config(&self, child: usize, total: u64) -> RunConfig {
        Self {
            total,
            process: 1,
            child,
            ..self.clone()
        }
    }

    /// Command-line flags that make a child process run one slice of this run.
    ///
    /// The child always runs with `--process 1`.
    pub fn child_args(&self, child: usize, total: u64) -> Vec<String> {
        self.child_config(child, total).to_args()
    }

    /// Command-line flags reproducing this configuration.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--host".to_string(),
            self.host.clone(),
            "--total".to_string(),
            self.total.to_string(),
            "--concurrency".to_string(),
            self.concurrency.to_string(),
            "--output".to_string(),
            self.output.display().to_string(),
            "--process".to_string(),
            self.process.to_string(),
            "--child".to_string(),
            self.child.to_string(),
        ];
        for (key, value) in &self.args {
            args.push(format!("--{}", key.replace('_', "-")));
            args.push(value.clone());
        }
        args
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Case name must not be empty")]
    EmptyCase,

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Process count must be at least 1")]
    ZeroProcess,

    #[error("Child index {child} given to an orchestrator run with {process} processes")]
    ChildOfFanout { child: usize, process: usize },

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid argument {name}={value}: {reason}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_worker_quota_applies_over_generation() {
        let config = RunConfig::new("transaction")
            .with_total(1_000_000)
            .with_concurrency(20);
        assert_eq!(config.per_worker_quota(), 55_000);

        let config = RunConfig::new("transaction")
            .with_total(200_000)
            .with_concurrency(20);
        assert_eq!(config.per_worker_quota(), 11_000);
    }

    #[test]
    fn test_per_worker_quota_truncates_even_split_first() {
        // 105 / 10 = 10, then 10 * 1.1 = 11
        let config = RunConfig::new("transaction").with_total(105).with_concurrency(10);
        assert_eq!(config.per_worker_quota(), 11);

        // 9 / 1 = 9, 9 * 1.1 = 9.9 -> 9
        let config = RunConfig::new("transaction").with_total(9).with_concurrency(1);
        assert_eq!(config.per_worker_quota(), 9);

        let config = RunConfig::new("transaction").with_total(3).with_concurrency(4);
        assert_eq!(config.per_worker_quota(), 0);
    }

    #[test]
    fn test_per_worker_quota_does_not_overflow() {
        let config = RunConfig::new("transaction")
            .with_total(u64::MAX / 5)
            .with_concurrency(1);
        // 3_689_348_814_741_910_323 * 11 / 10
        assert_eq!(config.per_worker_quota(), 4_058_283_696_216_101_355);

        // 1.1 * u64::MAX does not fit; saturate
        let config = RunConfig::new("transaction")
            .with_total(u64::MAX)
            .with_concurrency(1);
        assert_eq!(config.per_worker_quota(), u64::MAX);
    }

    #[test]
    fn test_validate() {
        assert!(RunConfig::new("transaction").validate().is_ok());
        assert_eq!(
            RunConfig::new("transaction").with_concurrency(0).validate(),
            Err(ConfigError::ZeroConcurrency)
        );
        assert_eq!(
            RunConfig::new("transaction").with_process(0).validate(),
            Err(ConfigError::ZeroProcess)
        );
        assert_eq!(
            RunConfig::new("transaction")
                .with_process(3)
                .with_child(1)
                .validate(),
            Err(ConfigError::ChildOfFanout {
                child: 1,
                process: 3
            })
        );
        assert_eq!(RunConfig::new("").validate(), Err(ConfigError::EmptyCase));
    }

    #[test]
    fn test_child_args_pin_process_to_one() {
        let config = RunConfig::new("short_content")
            .with_host("10.0.0.1:37101")
            .with_total(1000)
            .with_concurrency(4)
            .with_output("/tmp/out")
            .with_process(5)
            .with_arg("length", "128")
            .with_arg("code_path", "c.wasm");

        let args = config.child_args(2, 200);
        let joined = args.join(" ");
        assert_eq!(
            joined,
            "--host 10.0.0.1:37101 --total 200 --concurrency 4 --output /tmp/out \
             --process 1 --child 2 --code-path c.wasm --length 128"
        );
    }

    #[test]
    fn test_required_arg() {
        let config = RunConfig::new("short_content").with_arg("length", "64");
        assert_eq!(config.required_arg("length"), Ok("64"));
        assert_eq!(
            config.required_arg("amount"),
            Err(ConfigError::MissingArgument("amount"))
        );
    }
}
