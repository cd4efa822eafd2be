//! Persistence backends for session state, cached chain facts and history.
//!
//! # Data Flow
//! ```text
//! StateStore / ChainCache / TxLedger
//!     → StorageBackend::{load, save, remove} (JSON values by key)
//!     → file.rs   (<dir>/<network_id>/<key>.json, survives restart)
//!     → memory.rs (process-local map, isolated per instance)
//! ```
//!
//! # Design Decisions
//! - One backend instance per network scope; keys never encode the network
//! - Values are `serde_json::Value` so callers own their schemas
//! - Each key is independently clearable

pub mod file;
pub mod memory;

use serde_json::Value;
use thiserror::Error;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key holding the session snapshot.
pub const SESSION_KEY: &str = "session";
/// Key holding the transaction history mapping.
pub const HISTORY_KEY: &str = "tx_history";
/// Key holding the cached access-key nonce.
pub const NONCE_KEY: &str = "nonce";
/// Key holding the cached latest block reference.
pub const BLOCK_KEY: &str = "block";
/// Key remembering the last account that completed sign-in.
pub const LAST_ACCOUNT_KEY: &str = "last_account";

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Key-value persistence for JSON documents.
pub trait StorageBackend: Send + Sync {
    /// Read a value; `Ok(None)` if absent.
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write a value, replacing any previous one.
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Delete a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
