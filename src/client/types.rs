//! Facade-level request and result types.

use serde::{Deserialize, Serialize};

use crate::relay::WalletAccount;

/// Whether the client has a signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    SignedIn,
    SignedOut,
}

/// Snapshot of the active network and identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub network: String,
    pub node_url: Option<String>,
    pub wallet_url: Option<String>,
    pub helper_url: Option<String>,
    pub explorer_url: Option<String>,
    pub account: Option<String>,
    pub contract: Option<String>,
    pub public_key: Option<String>,
}

/// What to ask the wallet for at sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInParams {
    /// Contract the new access key is scoped to.
    pub contract_id: Option<String>,
    pub method_names: Option<Vec<String>>,
}

impl SignInParams {
    pub fn for_contract(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: Some(contract_id.into()),
            method_names: None,
        }
    }
}

/// Successful sign-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInOutcome {
    pub account_id: String,
    pub public_key: Option<String>,
    pub network_id: String,
    pub contract_id: Option<String>,
    pub method_names: Option<Vec<String>>,
    pub accounts: Vec<WalletAccount>,
    /// A different account signed in here before.
    pub is_reconnection: bool,
}

/// Message signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageParams {
    pub message: String,
    pub recipient: String,
    /// 32-byte nonce; generated when absent.
    pub nonce: Option<[u8; 32]>,
    pub callback_url: Option<String>,
}

impl SignMessageParams {
    pub fn new(message: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recipient: recipient.into(),
            nonce: None,
            callback_url: None,
        }
    }
}

/// Wallet-produced message signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub account_id: String,
    pub public_key: String,
    pub signature: String,
}
