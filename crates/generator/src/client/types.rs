//! Types for RPC client communication.

use serde::{Deserialize, Serialize};

/// Request to submit a transaction.
#[derive(Debug, Serialize)]
pub struct SubmitTransactionRequest {
    pub transaction_hex: String,
}

/// Response from transaction submission.
#[derive(Debug, Deserialize)]
pub struct SubmitTransactionResponse {
    pub accepted: bool,
    pub hash: String,
    pub error: Option<String>,
}

/// Response to an account nonce query.
#[derive(Debug, Deserialize)]
pub struct AccountNonceResponse {
    pub nonce: u64,
}

/// Result of a transaction submission.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    /// Whether the transaction was accepted.
    pub accepted: bool,
    /// The transaction hash.
    pub hash: String,
    /// Error message if rejected.
    pub error: Option<String>,
    /// HTTP status code.
    pub status_code: u16,
}

impl SubmissionResult {
    /// Check if the submission was successful.
    pub fn is_success(&self) -> bool {
        self.accepted && self.status_code >= 200 && self.status_code < 300
    }
}
