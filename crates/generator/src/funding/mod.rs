//! Pre-funding of worker accounts.
//!
//! Before a multi-process transfer run, the bank account's balance is split
//! into one funded account per worker across every process. Each worker then
//! signs from its own account, so concurrent workers never contend on a
//! shared sender nonce.

use crate::accounts::{accounts_for_shards, FundedAccount};
use crate::client::{Backend, RpcError};
use tracing::{debug, info};
use xbench_types::{Payload, ShardIndex, SplitOutput, Transaction, TransactionError};

/// Maximum number of outputs carried by one split transaction.
pub const MAX_SPLIT_OUTPUTS: usize = 500;

/// Splits one funded source account into many funded worker accounts.
pub struct FundingSplitter<B> {
    backend: B,
}

impl<B: Backend> FundingSplitter<B> {
    /// Create a splitter submitting through `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Fund `count` worker accounts with `amount` each from `source`.
    ///
    /// Returns the funded accounts in shard order (shard 0 first). Every split
    /// transaction must be accepted; the first rejection aborts the split.
    pub async fn split(
        &self,
        source: &FundedAccount,
        amount: u64,
        count: usize,
    ) -> Result<Vec<FundedAccount>, SplitError> {
        if count == 0 {
            return Err(SplitError::ZeroCount);
        }
        if amount == 0 {
            return Err(SplitError::ZeroAmount);
        }

        let accounts = accounts_for_shards(ShardIndex(0), count);

        info!(
            source = %source.address,
            count,
            amount,
            batches = count.div_ceil(MAX_SPLIT_OUTPUTS),
            "Splitting funds into worker accounts"
        );

        for (batch, chunk) in accounts.chunks(MAX_SPLIT_OUTPUTS).enumerate() {
            let outputs = chunk
                .iter()
                .map(|account| SplitOutput {
                    to: account.address.clone(),
                    amount,
                })
                .collect();

            let tx = Transaction::sign(
                &source.keypair,
                source.next_nonce(),
                Payload::Split { outputs },
            )?;
            let result = self.backend.submit_transaction(&tx).await?;

            if !result.is_success() {
                return Err(SplitError::Rejected {
                    batch,
                    hash: result.hash,
                    reason: result.error.unwrap_or_else(|| "rejected".to_string()),
                });
            }

            debug!(batch, outputs = chunk.len(), hash = %result.hash, "Split batch accepted");
        }

        info!(count, "Funded worker accounts");
        Ok(accounts)
    }
}

/// Errors during the funding split.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("Split count must be at least 1")]
    ZeroCount,

    #[error("Split amount must be greater than zero")]
    ZeroAmount,

    #[error("Split transaction build failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Split submission failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("Split batch {batch} ({hash}) rejected: {reason}")]
    Rejected {
        batch: usize,
        hash: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use std::collections::HashSet;
    use xbench_types::Address;

    #[tokio::test]
    async fn test_split_funds_every_account_once() {
        let splitter = FundingSplitter::new(MockBackend::default());
        let bank = FundedAccount::bank();

        let accounts = splitter.split(&bank, 1_000, 1_200).await.unwrap();
        assert_eq!(accounts.len(), 1_200);

        let submitted = splitter.backend.submitted.lock();
        assert_eq!(submitted.len(), 3);

        let mut funded: HashSet<Address> = HashSet::new();
        for (i, tx) in submitted.iter().enumerate() {
            assert!(tx.verify());
            assert_eq!(tx.from, bank.address);
            assert_eq!(tx.nonce, i as u64);
            match &tx.payload {
                Payload::Split { outputs } => {
                    assert!(outputs.len() <= MAX_SPLIT_OUTPUTS);
                    for output in outputs {
                        assert_eq!(output.amount, 1_000);
                        assert!(funded.insert(output.to.clone()));
                    }
                }
                other => panic!("unexpected payload {:?}", other),
            }
        }

        let returned: HashSet<Address> = accounts.iter().map(|a| a.address.clone()).collect();
        assert_eq!(funded, returned);
    }

    #[tokio::test]
    async fn test_split_accounts_can_sign_independently() {
        let splitter = FundingSplitter::new(MockBackend::default());
        let accounts = splitter
            .split(&FundedAccount::bank(), 50, 4)
            .await
            .unwrap();

        for account in &accounts {
            let tx = Transaction::sign(
                &account.keypair,
                account.next_nonce(),
                Payload::Transfer {
                    to: FundedAccount::bank().address,
                    amount: 1,
                },
            )
            .unwrap();
            assert!(tx.verify());
            assert_eq!(tx.from, account.address);
        }
    }

    #[tokio::test]
    async fn test_split_rejection_aborts() {
        let splitter = FundingSplitter::new(MockBackend::rejecting_after(1));

        let err = splitter
            .split(&FundedAccount::bank(), 10, MAX_SPLIT_OUTPUTS * 3)
            .await
            .unwrap_err();

        match err {
            SplitError::Rejected { batch, reason, .. } => {
                assert_eq!(batch, 1);
                assert_eq!(reason, "insufficient balance");
            }
            other => panic!("unexpected error {:?}", other),
        }
        // Third batch is never submitted
        assert_eq!(splitter.backend.submitted_count(), 2);
    }

    #[tokio::test]
    async fn test_split_rejects_degenerate_requests() {
        let splitter = FundingSplitter::new(MockBackend::default());
        let bank = FundedAccount::bank();

        assert!(matches!(
            splitter.split(&bank, 10, 0).await,
            Err(SplitError::ZeroCount)
        ));
        assert!(matches!(
            splitter.split(&bank, 0, 10).await,
            Err(SplitError::ZeroAmount)
        ));
        assert_eq!(splitter.backend.submitted_count(), 0);
    }
}
