use crate::error::{MnError, Result};
use crate::hash::Hash;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// 20-byte account address, rendered as 0x-prefixed hex.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = MnError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 20];
        hex::decode_to_slice(s, &mut out)
            .map_err(|e| MnError::Codec(format!("address: {e}")))?;
        Ok(Address(out))
    }
}

/// Ethereum-style address: the low 20 bytes of keccak256 over the
/// uncompressed key without its 0x04 tag.
pub fn pubkey_to_address(key: &k256::PublicKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address(out)
}

#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn new_key() -> Self {
        PrivateKey(SigningKey::random(&mut rand::rngs::OsRng))
    }

    pub fn from_hex(secret: &str) -> Result<Self> {
        let secret = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(secret).map_err(|e| MnError::Codec(format!("secret key: {e}")))?;
        SigningKey::from_slice(&bytes)
            .map(PrivateKey)
            .map_err(|e| MnError::Codec(format!("secret key: {e}")))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn public_key(&self) -> k256::PublicKey {
        k256::PublicKey::from(self.0.verifying_key())
    }

    /// Compressed SEC1 form of the public key.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.0.verifying_key().to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn address(&self) -> Address {
        pubkey_to_address(&self.public_key())
    }
}

// never print key material
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PrivateKey({})", self.address())
    }
}

/// Fixed-size (r || s) ECDSA secp256k1 signature.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn sign_output(output_hash: &Hash, private_key: &PrivateKey) -> Self {
        let signature: EcdsaSignature = private_key.0.sign(output_hash.as_bytes());
        Signature(signature.to_bytes().to_vec())
    }

    /// Check the signature against a SEC1-encoded public key.
    pub fn verify(&self, output_hash: &Hash, public_key: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
            return false;
        };
        let Ok(signature) = EcdsaSignature::from_slice(&self.0) else {
            return false;
        };
        key.verify(output_hash.as_bytes(), &signature).is_ok()
    }
}
