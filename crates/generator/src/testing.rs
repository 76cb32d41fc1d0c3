//! Shared fixtures for unit tests.

use crate::client::{Backend, RpcError, SubmissionResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use xbench_types::{Address, Transaction};

/// In-memory backend that records every submitted transaction.
#[derive(Default)]
pub(crate) struct MockBackend {
    pub submitted: Mutex<Vec<Transaction>>,
    /// Accept only this many submissions, reject the rest.
    pub reject_after: Option<usize>,
}

impl MockBackend {
    pub fn rejecting_after(n: usize) -> Self {
        Self {
            reject_after: Some(n),
            ..Default::default()
        }
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Submitted transactions matching `f`.
    pub fn submitted_where(&self, f: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        self.submitted.lock().iter().filter(|tx| f(tx)).cloned().collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<SubmissionResult, RpcError> {
        let mut submitted = self.submitted.lock();
        let accepted = self.reject_after.map_or(true, |n| submitted.len() < n);
        submitted.push(tx.clone());
        Ok(SubmissionResult {
            accepted,
            hash: tx.hash.to_hex(),
            error: (!accepted).then(|| "insufficient balance".to_string()),
            status_code: 200,
        })
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64, RpcError> {
        let submitted = self.submitted.lock();
        let accepted = self.reject_after.unwrap_or(usize::MAX);
        let used = submitted
            .iter()
            .take(accepted)
            .filter(|tx| &tx.from == address)
            .count();
        Ok(used as u64)
    }
}
