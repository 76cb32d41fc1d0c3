//! Domain-separated signing messages for workload transactions.
//!
//! The signing message is the domain tag followed by the canonical JSON
//! encoding of the unsigned transaction body. Payload argument maps are
//! ordered (`BTreeMap`), so the encoding is deterministic.

use crate::{Address, Payload};
use serde::Serialize;

/// Domain tag for transaction signatures.
///
/// Format: `xbench_tx:` || json({ from, nonce, payload })
pub const DOMAIN_TRANSACTION: &[u8] = b"xbench_tx:";

#[derive(Serialize)]
struct UnsignedBody<'a> {
    from: &'a Address,
    nonce: u64,
    payload: &'a Payload,
}

/// Build the signing message for a transaction body.
pub fn transaction_message(
    from: &Address,
    nonce: u64,
    payload: &Payload,
) -> Result<Vec<u8>, serde_json::Error> {
    let body = serde_json::to_vec(&UnsignedBody {
        from,
        nonce,
        payload,
    })?;

    let mut message = Vec::with_capacity(DOMAIN_TRANSACTION.len() + body.len());
    message.extend_from_slice(DOMAIN_TRANSACTION);
    message.extend_from_slice(&body);
    Ok(message)
}
