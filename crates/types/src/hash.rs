//! Blake3 digests.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::fmt;
use std::str::FromStr;

/// 32-byte Blake3 digest. Serialized as lowercase hex.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash(#[serde_as(as = "Hex")] [u8; 32]);

impl Hash {
    pub const BYTES: usize = 32;

    /// Digest of a single buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).into())
    }

    /// Digest of the concatenation of `parts`, without allocating it.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let digest = parts
            .iter()
            .fold(blake3::Hasher::new(), |mut hasher, part| {
                hasher.update(part);
                hasher
            })
            .finalize();
        Self(digest.into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; Self::BYTES];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| match e {
            hex::FromHexError::InvalidStringLength | hex::FromHexError::OddLength => {
                HexError::Length(s.len())
            }
            _ => HexError::Digit,
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form; full digests drown log lines
        let hex = self.to_hex();
        write!(f, "Hash({}..)", &hex[..12])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hex digest parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("Digest must be 64 hex characters, got {0}")]
    Length(usize),

    #[error("Digest contains a non-hex character")]
    Digit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_matches_concatenation() {
        assert_eq!(
            Hash::from_parts(&[b"xbench", b"_tx"]),
            Hash::from_bytes(b"xbench_tx")
        );
        assert_ne!(Hash::from_bytes(b"a"), Hash::from_bytes(b"b"));
    }

    #[test]
    fn test_parse() {
        let hash = Hash::from_bytes(b"shard");
        assert_eq!(hash.to_hex().parse::<Hash>(), Ok(hash));
        assert_eq!("abcd".parse::<Hash>(), Err(HexError::Length(4)));
        assert_eq!("zz".repeat(32).parse::<Hash>(), Err(HexError::Digit));
    }

    #[test]
    fn test_json_is_plain_hex_string() {
        let hash = Hash::from_bytes(b"payload");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash));
        assert_eq!(serde_json::from_str::<Hash>(&json).unwrap(), hash);
    }
}
