//! Shard files.
//!
//! Each worker owns exactly one shard file, named
//! `<case>.dat.<zero-padded shard index>`, holding one JSON transaction per
//! line in generation order.

use crate::config::RunConfig;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use xbench_types::{ShardIndex, Transaction};

/// Receives the transactions produced by one worker.
pub trait TxSink: Send {
    /// Persist one transaction.
    fn consume(&mut self, tx: &Transaction) -> Result<(), ShardError>;

    /// Flush everything consumed so far. Called once when the worker stops.
    fn finish(&mut self) -> Result<(), ShardError>;
}

/// File name of a shard.
pub fn shard_file_name(case: &str, shard: ShardIndex) -> String {
    format!("{}.dat.{}", case, shard)
}

/// Append-only JSON-lines writer for one shard.
pub struct ShardWriter {
    shard: ShardIndex,
    path: PathBuf,
    writer: BufWriter<File>,
    /// Reused encode buffer; a record is written only once fully encoded.
    line: Vec<u8>,
    written: u64,
}

impl ShardWriter {
    /// Create (or truncate) the shard file for `shard` in `dir`.
    pub fn create(dir: &Path, case: &str, shard: ShardIndex) -> Result<Self, ShardError> {
        let path = dir.join(shard_file_name(case, shard));
        let file = File::create(&path).map_err(|source| ShardError::Create {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            shard,
            path,
            writer: BufWriter::with_capacity(1 << 20, file),
            line: Vec::with_capacity(1024),
            written: 0,
        })
    }

    /// Shard index this writer owns.
    pub fn shard(&self) -> ShardIndex {
        self.shard
    }

    /// Number of records written.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl TxSink for ShardWriter {
    fn consume(&mut self, tx: &Transaction) -> Result<(), ShardError> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, tx)?;
        self.line.push(b'\n');

        self.writer
            .write_all(&self.line)
            .map_err(|source| ShardError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ShardError> {
        self.writer.flush().map_err(|source| ShardError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            shard = %self.shard,
            path = %self.path.display(),
            written = self.written,
            "Closed shard file"
        );
        Ok(())
    }
}

/// Create one shard writer per worker of this process.
///
/// The output directory is created if missing.
pub fn create_shard_writers(config: &RunConfig) -> Result<Vec<ShardWriter>, ShardError> {
    std::fs::create_dir_all(&config.output).map_err(|source| ShardError::CreateDir {
        path: config.output.clone(),
        source,
    })?;

    (0..config.concurrency)
        .map(|worker| ShardWriter::create(&config.output, &config.case, config.shard_index(worker)))
        .collect()
}

/// Shard file errors.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create shard file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode transaction: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write shard file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbench_types::{Address, KeyPair, Payload};

    fn transfer(nonce: u64) -> Transaction {
        let keypair = KeyPair::from_seed(&[5u8; 32]);
        Transaction::sign(
            &keypair,
            nonce,
            Payload::Transfer {
                to: Address::from_public_key(&KeyPair::from_seed(&[6u8; 32]).public_key()),
                amount: 1,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_shard_file_name() {
        assert_eq!(
            shard_file_name("transaction", ShardIndex(0)),
            "transaction.dat.0000"
        );
        assert_eq!(
            shard_file_name("short_content", ShardIndex(59)),
            "short_content.dat.0059"
        );
    }

    #[test]
    fn test_writer_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ShardWriter::create(dir.path(), "transaction", ShardIndex(3)).unwrap();

        for nonce in 0..5 {
            writer.consume(&transfer(nonce)).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(writer.written(), 5);

        let contents = std::fs::read_to_string(dir.path().join("transaction.dat.0003")).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(contents.ends_with('\n'));

        for (nonce, line) in lines.iter().enumerate() {
            let tx: Transaction = serde_json::from_str(line).unwrap();
            assert_eq!(tx.nonce, nonce as u64);
            assert!(tx.verify());
        }
    }

    #[test]
    fn test_create_shard_writers_uses_global_indices() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("out");
        let config = RunConfig::new("transaction")
            .with_concurrency(3)
            .with_child(2)
            .with_output(&output);

        let writers = create_shard_writers(&config).unwrap();
        let shards: Vec<_> = writers.iter().map(|w| w.shard()).collect();
        assert_eq!(shards, vec![ShardIndex(6), ShardIndex(7), ShardIndex(8)]);

        for shard in 6..9 {
            assert!(output.join(format!("transaction.dat.{:04}", shard)).exists());
        }
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(matches!(
            ShardWriter::create(&missing, "transaction", ShardIndex(0)),
            Err(ShardError::Create { .. })
        ));
    }
}
