use crate::error::{MnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 32-byte sha256 digest. Block hashes double as chain heads.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Hash the CBOR encoding of `data`.
    pub fn hash<T: Serialize>(data: &T) -> Result<Self> {
        let mut serialized: Vec<u8> = vec![];
        ciborium::into_writer(data, &mut serialized).map_err(|e| MnError::Codec(e.to_string()))?;
        Ok(Self::digest(&serialized))
    }

    pub fn digest(bytes: &[u8]) -> Self {
        let hex_digest = sha256::digest(bytes);
        let mut out = [0u8; 32];
        // sha256::digest always yields 64 lowercase hex characters
        hex::decode_to_slice(hex_digest, &mut out).expect("BUG: sha256 digest is not hex");
        Hash(out)
    }

    pub fn zero() -> Self {
        Hash([0; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = MnError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).map_err(|e| MnError::Codec(format!("hash: {e}")))?;
        Ok(Hash(out))
    }
}

/// Pending transaction identifier returned by write operations.
pub type TxHash = Hash;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_vector() {
        let hash = Hash::digest(b"abc");
        assert_eq!(
            hash.to_string(),
            "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parses_with_and_without_prefix() {
        let hash = Hash::digest(b"head");
        let text = hash.to_string();
        assert_eq!(text.parse::<Hash>().unwrap(), hash);
        assert_eq!(text[2..].parse::<Hash>().unwrap(), hash);
        assert!("0x1234".parse::<Hash>().is_err());
    }
}
