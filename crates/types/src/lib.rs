//! Core types for xbench workloads.
//!
//! Keys, hashes, addresses and the signed [`Transaction`] record that the
//! generator writes into shard files.

mod crypto;
mod hash;
mod identifiers;
pub mod signing;
mod transaction;

pub use crypto::{KeyPair, PublicKey, Signature};
pub use hash::{Hash, HexError};
pub use identifiers::{Address, ShardIndex};
pub use transaction::{Payload, SplitOutput, Transaction, TransactionError};
