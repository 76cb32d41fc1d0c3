//! Single-process generation run.

use crate::config::{ConfigError, RunConfig};
use crate::engine::{format_elapsed, Engine, EngineError, EngineReport};
use crate::shard::{create_shard_writers, ShardError};
use crate::workloads::{GeneratorError, GeneratorRegistry};
use std::sync::Arc;
use tracing::{info, warn};

/// Largest shard index that fits the four-digit file suffix.
const MAX_PADDED_SHARD: u64 = 9999;

/// Generate this process' shards: build and initialize the generator, open
/// one shard file per worker, then run the engine to completion.
pub async fn run_local(
    config: &RunConfig,
    registry: &GeneratorRegistry,
) -> Result<EngineReport, RunError> {
    config.validate()?;

    let last_shard = config.shard_index(config.concurrency - 1);
    if last_shard.0 > MAX_PADDED_SHARD {
        warn!(
            last_shard = last_shard.0,
            "Shard index exceeds four digits; file names will not sort lexically"
        );
    }

    let mut generator = registry.build(config)?;
    generator.init().await.map_err(RunError::Init)?;

    let writers = create_shard_writers(config)?;
    let engine = Engine::from_config(config);

    info!(
        case = %config.case,
        child = config.child,
        total = config.total,
        concurrency = config.concurrency,
        quota = engine.quota(),
        output = %config.output.display(),
        "Starting generation"
    );

    let report = engine.run(Arc::from(generator), writers).await?;

    info!(
        child = config.child,
        pid = std::process::id(),
        written = report.total(),
        elapsed = %format_elapsed(report.elapsed),
        "Generation complete"
    );
    Ok(report)
}

/// Errors from a generation run, by stage.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Generator construction failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Generator init failed: {0}")]
    Init(#[source] GeneratorError),

    #[error("Shard setup failed: {0}")]
    Shard(#[from] ShardError),

    #[error("Generation failed: {0}")]
    Engine(#[from] EngineError),
}
