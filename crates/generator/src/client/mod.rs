//! RPC client for submitting setup transactions to the backend.

mod types;

pub use types::{
    AccountNonceResponse, SubmissionResult, SubmitTransactionRequest, SubmitTransactionResponse,
};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use xbench_types::{Address, Transaction, TransactionError};

/// Backend that accepts signed transactions.
///
/// The split stage and contract deployment talk to the backend only through
/// this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Submit one transaction and report whether the backend accepted it.
    async fn submit_transaction(&self, tx: &Transaction) -> Result<SubmissionResult, RpcError>;

    /// Next nonce the backend expects from `address`.
    async fn next_nonce(&self, address: &Address) -> Result<u64, RpcError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<SubmissionResult, RpcError> {
        (**self).submit_transaction(tx).await
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64, RpcError> {
        (**self).next_nonce(address).await
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for &B {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<SubmissionResult, RpcError> {
        (**self).submit_transaction(tx).await
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64, RpcError> {
        (**self).next_nonce(address).await
    }
}

/// HTTP client for one backend endpoint.
#[derive(Clone, Debug)]
pub struct RpcClient {
    base_url: String,
    http: reqwest::Client,
}

impl RpcClient {
    /// Create a client for `host` (`ip:port` or a full URL).
    pub fn new(host: impl AsRef<str>) -> Result<Self, RpcError> {
        let host = host.as_ref().trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { base_url, http })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Backend for RpcClient {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<SubmissionResult, RpcError> {
        let request = SubmitTransactionRequest {
            transaction_hex: hex::encode(tx.encode()?),
        };

        let url = format!("{}/api/v1/transactions", self.base_url);
        let response = self.http.post(&url).json(&request).send().await?;
        let status_code = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status {
                status: status_code,
                body,
            });
        }

        let body: SubmitTransactionResponse = response.json().await?;
        debug!(hash = %body.hash, accepted = body.accepted, "Submitted transaction");

        Ok(SubmissionResult {
            accepted: body.accepted,
            hash: body.hash,
            error: body.error,
            status_code,
        })
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64, RpcError> {
        let url = format!("{}/api/v1/accounts/{}/nonce", self.base_url, address);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status { status, body });
        }

        let body: AccountNonceResponse = response.json().await?;
        debug!(%address, nonce = body.nonce, "Fetched account nonce");
        Ok(body.nonce)
    }
}

/// RPC client errors.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transaction encoding failed: {0}")]
    Encode(#[from] TransactionError),
}
