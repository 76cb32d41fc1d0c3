//! Concurrent generation engine.
//!
//! Runs a fixed pool of workers inside one process. Each worker drives the
//! shared [`Generator`] in a tight loop and hands every transaction to the
//! sink it exclusively owns, until it reaches its quota.
//!
//! The first fatal error in any worker cancels the others: siblings stop
//! before their next generate call, flush what they already wrote, and the
//! engine returns that first error.

mod progress;

pub use progress::{ProgressCounter, PROGRESS_BATCH, PROGRESS_LOG_INTERVAL};

use crate::config::RunConfig;
use crate::shard::{ShardError, TxSink};
use crate::workloads::{Generator, GeneratorError};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs `concurrency` workers, each producing `quota` transactions.
pub struct Engine {
    concurrency: usize,
    quota: u64,
    progress: Arc<ProgressCounter>,
    cancel: CancellationToken,
}

impl Engine {
    /// Create an engine with a per-worker quota.
    pub fn new(concurrency: usize, quota: u64) -> Self {
        Self {
            concurrency,
            quota,
            progress: Arc::new(ProgressCounter::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Create an engine sized from a run configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.concurrency, config.per_worker_quota())
    }

    /// Use a shared progress counter.
    pub fn with_progress(mut self, progress: Arc<ProgressCounter>) -> Self {
        self.progress = progress;
        self
    }

    /// Per-worker quota.
    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Shared progress counter.
    pub fn progress(&self) -> &Arc<ProgressCounter> {
        &self.progress
    }

    /// Token that stops every worker when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run all workers to completion.
    ///
    /// `sinks[i]` is moved into worker `i`; exactly one sink per worker is
    /// required.
    pub async fn run<S>(
        &self,
        generator: Arc<dyn Generator>,
        sinks: Vec<S>,
    ) -> Result<EngineReport, EngineError>
    where
        S: TxSink + 'static,
    {
        if sinks.len() != self.concurrency {
            return Err(EngineError::SinkCount {
                expected: self.concurrency,
                actual: sinks.len(),
            });
        }

        let start = Instant::now();
        info!(
            workers = self.concurrency,
            quota = self.quota,
            "Starting generation workers"
        );

        let handles: Vec<_> = sinks
            .into_iter()
            .enumerate()
            .map(|(worker_id, sink)| {
                let worker = Worker {
                    worker_id,
                    quota: self.quota,
                    generator: Arc::clone(&generator),
                    sink,
                    progress: Arc::clone(&self.progress),
                    cancel: self.cancel.clone(),
                };
                tokio::task::spawn_blocking(move || worker.run())
            })
            .collect();

        let mut produced = vec![0u64; self.concurrency];
        let mut first_error: Option<EngineError> = None;

        for (worker_id, joined) in join_all(handles).await.into_iter().enumerate() {
            let result = joined.unwrap_or_else(|_| {
                self.cancel.cancel();
                Err(EngineError::WorkerPanicked { worker: worker_id })
            });
            match result {
                Ok(outcome) => produced[worker_id] = outcome.produced,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let report = EngineReport {
            produced,
            elapsed: start.elapsed(),
        };
        info!(
            total = report.total(),
            elapsed = %format_elapsed(report.elapsed),
            "Generation workers finished"
        );
        Ok(report)
    }
}

/// Human-readable elapsed time, rounded to milliseconds.
pub(crate) fn format_elapsed(d: Duration) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_millis(d.as_millis() as u64))
}

/// What a worker did before stopping.
struct WorkerOutcome {
    produced: u64,
}

/// One generation worker. Owns its sink exclusively.
struct Worker<S> {
    worker_id: usize,
    quota: u64,
    generator: Arc<dyn Generator>,
    sink: S,
    progress: Arc<ProgressCounter>,
    cancel: CancellationToken,
}

impl<S: TxSink> Worker<S> {
    fn run(mut self) -> Result<WorkerOutcome, EngineError> {
        let mut produced = 0u64;
        let looped = self.generate_until_done(&mut produced);
        let flushed = self.sink.finish().map_err(|source| EngineError::Consume {
            worker: self.worker_id,
            source,
        });

        match looped.and(flushed) {
            Ok(()) => {
                debug!(worker = self.worker_id, produced, "Worker finished");
                Ok(WorkerOutcome { produced })
            }
            Err(e) => {
                self.cancel.cancel();
                error!(worker = self.worker_id, produced, error = %e, "Worker failed");
                Err(e)
            }
        }
    }

    fn generate_until_done(&mut self, produced: &mut u64) -> Result<(), EngineError> {
        while *produced < self.quota {
            if self.cancel.is_cancelled() {
                debug!(worker = self.worker_id, produced = *produced, "Worker cancelled");
                return Ok(());
            }

            let tx = self
                .generator
                .generate(self.worker_id)
                .map_err(|source| EngineError::Generate {
                    worker: self.worker_id,
                    source,
                })?;

            self.sink
                .consume(&tx)
                .map_err(|source| EngineError::Consume {
                    worker: self.worker_id,
                    source,
                })?;

            *produced += 1;
            if *produced % PROGRESS_BATCH == 0 {
                self.progress.add(PROGRESS_BATCH);
            }
        }
        Ok(())
    }
}

/// Summary of a completed engine run.
#[derive(Debug, Clone)]
pub struct EngineReport {
    /// Transactions produced by each worker.
    pub produced: Vec<u64>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl EngineReport {
    /// Transactions produced by all workers.
    pub fn total(&self) -> u64 {
        self.produced.iter().sum()
    }
}

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Expected {expected} sinks, got {actual}")]
    SinkCount { expected: usize, actual: usize },

    #[error("Worker {worker} failed to generate transaction: {source}")]
    Generate {
        worker: usize,
        #[source]
        source: GeneratorError,
    },

    #[error("Worker {worker} failed to write transaction: {source}")]
    Consume {
        worker: usize,
        #[source]
        source: ShardError,
    },

    #[error("Worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}
