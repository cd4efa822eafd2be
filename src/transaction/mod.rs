//! Transaction primitives: keys, actions, encoding and signing.
//!
//! # Data Flow
//! ```text
//! Action list + session key + nonce + block hash
//!     → PlainTransaction (borsh encoding)
//!     → sha256 → CryptoHash
//!     → ed25519 signature over the hash
//!     → SignedTransaction (borsh, base64 for transport)
//! ```
//!
//! # Security Constraints
//! - Secret keys never appear in `Debug` output or logs

pub mod actions;
pub mod keys;
pub mod signed;

use thiserror::Error;

pub use actions::{AccessKey, AccessKeyPermission, Action, FunctionCallPermission};
pub use keys::{public_key_from_private, KeyPair, PublicKey};
pub use signed::{CryptoHash, PlainTransaction, SignedTransaction};

/// Errors from key handling and transaction encoding.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("encoding failed: {0}")]
    Encoding(#[from] std::io::Error),
}

pub type TransactionResult<T> = Result<T, TransactionError>;
