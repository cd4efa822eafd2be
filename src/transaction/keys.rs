//! ed25519 key material in NEAR's `ed25519:<base58>` text form.

use std::fmt;
use std::str::FromStr;

use borsh::BorshSerialize;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::transaction::{TransactionError, TransactionResult};

const ED25519_PREFIX: &str = "ed25519:";

/// ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ED25519_PREFIX, bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_key(s)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            TransactionError::InvalidKey(format!("public key must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl BorshSerialize for PublicKey {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        // Key type tag: 0 = ed25519
        BorshSerialize::serialize(&0u8, writer)?;
        writer.write_all(&self.0)
    }
}

/// ed25519 signing key.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Parse a secret key. Accepts a 32-byte seed or NEAR's 64-byte seed‖public form.
    pub fn from_secret(secret: &str) -> TransactionResult<Self> {
        let bytes = decode_key(secret)?;
        let seed: [u8; 32] = match bytes.len() {
            32 | 64 => bytes[..32]
                .try_into()
                .map_err(|_| TransactionError::InvalidKey("malformed seed".to_string()))?,
            n => {
                return Err(TransactionError::InvalidKey(format!(
                    "secret key must be 32 or 64 bytes, got {n}"
                )))
            }
        };

        let signing = SigningKey::from_bytes(&seed);
        if bytes.len() == 64 && bytes[32..] != signing.verifying_key().to_bytes() {
            return Err(TransactionError::InvalidKey(
                "embedded public key does not match secret".to_string(),
            ));
        }
        Ok(Self { signing })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// Secret in `ed25519:<base58(seed‖public)>` form.
    pub fn secret(&self) -> String {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&self.signing.to_bytes());
        bytes.extend_from_slice(&self.signing.verifying_key().to_bytes());
        format!("{}{}", ED25519_PREFIX, bs58::encode(bytes).into_string())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key().to_string())
            .finish_non_exhaustive()
    }
}

/// Derive the `ed25519:` public key string for a secret key string.
pub fn public_key_from_private(secret: &str) -> TransactionResult<String> {
    Ok(KeyPair::from_secret(secret)?.public_key().to_string())
}

fn decode_key(s: &str) -> TransactionResult<Vec<u8>> {
    let body = match s.split_once(':') {
        Some(("ed25519", body)) => body,
        Some((curve, _)) => {
            return Err(TransactionError::InvalidKey(format!("unsupported curve '{curve}'")))
        }
        None => s,
    };
    bs58::decode(body)
        .into_vec()
        .map_err(|e| TransactionError::InvalidKey(format!("bad base58: {e}")))
}
