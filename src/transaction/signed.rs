//! Transaction encoding, hashing and signing.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use borsh::BorshSerialize;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::transaction::{Action, KeyPair, PublicKey, TransactionError, TransactionResult};

/// 32-byte hash, shown as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize)]
pub struct CryptoHash(pub [u8; 32]);

impl CryptoHash {
    pub fn sha256(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl fmt::Display for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoHash({self})")
    }
}

impl FromStr for CryptoHash {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| TransactionError::InvalidHash(format!("bad base58: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            TransactionError::InvalidHash(format!("hash must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for CryptoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CryptoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Unsigned transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainTransaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: CryptoHash,
    pub actions: Vec<Action>,
}

impl PlainTransaction {
    pub fn to_borsh(&self) -> TransactionResult<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    /// sha256 of the borsh encoding; this is the transaction hash.
    pub fn hash(&self) -> TransactionResult<CryptoHash> {
        Ok(CryptoHash::sha256(&self.to_borsh()?))
    }

    /// Sign the transaction hash with `key`.
    pub fn sign(self, key: &KeyPair) -> TransactionResult<SignedTransaction> {
        if key.public_key() != self.public_key {
            return Err(TransactionError::InvalidKey(
                "signing key does not match transaction public key".to_string(),
            ));
        }
        let hash = self.hash()?;
        let signature = key.sign(&hash.0);
        Ok(SignedTransaction {
            transaction: self,
            signature,
            hash,
        })
    }
}

/// Transaction plus its ed25519 signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    pub transaction: PlainTransaction,
    pub signature: [u8; 64],
    pub hash: CryptoHash,
}

impl SignedTransaction {
    pub fn signature_base58(&self) -> String {
        bs58::encode(self.signature).into_string()
    }

    pub fn to_borsh(&self) -> TransactionResult<Vec<u8>> {
        let mut bytes = self.transaction.to_borsh()?;
        // Signature key type tag: 0 = ed25519
        bytes.push(0);
        bytes.extend_from_slice(&self.signature);
        Ok(bytes)
    }

    /// Base64 of the borsh encoding, the form `send_tx` expects.
    pub fn to_base64(&self) -> TransactionResult<String> {
        Ok(STANDARD.encode(self.to_borsh()?))
    }
}
