//! Crate-level error type.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::relay::RelayError;
use crate::rpc::RpcError;
use crate::state::StateError;
use crate::storage::StorageError;
use crate::transaction::TransactionError;

/// Errors surfaced by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A signing operation was requested without a signed-in account.
    #[error("not signed in")]
    Unauthenticated,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(RpcError),

    /// The signing nonce could not be obtained; nothing was signed.
    #[error("access key error: {0}")]
    AccessKey(String),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("wallet did not respond within {0:?}")]
    RelayTimeout(Duration),

    /// The wallet reported a failure.
    #[error("wallet error: {0}")]
    Wallet(String),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<RpcError> for ClientError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::NotConfigured => ClientError::Config(e.to_string()),
            other => ClientError::Rpc(other),
        }
    }
}

impl From<ConfigError> for ClientError {
    fn from(e: ConfigError) -> Self {
        ClientError::Config(e.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
