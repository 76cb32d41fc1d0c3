//! Signed workload transactions.

use crate::{signing, Address, Hash, KeyPair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::collections::BTreeMap;

/// One output of a split transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOutput {
    /// Receiving account.
    pub to: Address,
    /// Amount credited to the receiver.
    pub amount: u64,
}

/// What a transaction does.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Plain value transfer.
    Transfer { to: Address, amount: u64 },

    /// Fan one balance out into many accounts.
    Split { outputs: Vec<SplitOutput> },

    /// Deploy contract bytecode under a name.
    DeployContract {
        module: String,
        name: String,
        #[serde_as(as = "Hex")]
        code: Vec<u8>,
        args: BTreeMap<String, String>,
    },

    /// Invoke a method on a deployed contract.
    InvokeContract {
        module: String,
        contract: String,
        method: String,
        args: BTreeMap<String, String>,
    },
}

/// A signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Hash over the signing message and signature.
    pub hash: Hash,
    /// Sender account.
    pub from: Address,
    /// Sender nonce.
    pub nonce: u64,
    /// Transaction body.
    pub payload: Payload,
    /// Sender public key.
    pub public_key: PublicKey,
    /// Signature over the signing message.
    pub signature: Signature,
}

impl Transaction {
    /// Build and sign a transaction from `keypair`'s account.
    pub fn sign(keypair: &KeyPair, nonce: u64, payload: Payload) -> Result<Self, TransactionError> {
        match &payload {
            Payload::Transfer { amount: 0, .. } => return Err(TransactionError::ZeroAmount),
            Payload::Split { outputs } if outputs.is_empty() => {
                return Err(TransactionError::EmptySplit)
            }
            Payload::Split { outputs } if outputs.iter().any(|o| o.amount == 0) => {
                return Err(TransactionError::ZeroAmount)
            }
            _ => {}
        }

        let public_key = keypair.public_key();
        let from = Address::from_public_key(&public_key);
        let message = signing::transaction_message(&from, nonce, &payload)?;
        let signature = keypair.sign(&message);
        let hash = Hash::from_parts(&[&message, signature.as_bytes()]);

        Ok(Self {
            hash,
            from,
            nonce,
            payload,
            public_key,
            signature,
        })
    }

    /// Check that the sender owns the key, the signature is valid, and the
    /// hash matches.
    pub fn verify(&self) -> bool {
        if Address::from_public_key(&self.public_key) != self.from {
            return false;
        }
        let message = match signing::transaction_message(&self.from, self.nonce, &self.payload) {
            Ok(m) => m,
            Err(_) => return false,
        };
        self.public_key.verify(&message, &self.signature)
            && self.hash == Hash::from_parts(&[&message, self.signature.as_bytes()])
    }

    /// Encode as compact JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Errors raised while building a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Transaction encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Split transaction has no outputs")]
    EmptySplit,

    #[error("Amount must be greater than zero")]
    ZeroAmount,
}
