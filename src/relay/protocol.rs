//! Wire types exchanged with the wallet surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transaction::Action;

/// Tag carried by every relay message in both directions.
pub const MESSAGE_TYPE: &str = "wallet-adapter";

/// Relay operations and the surface path each one loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    SignIn,
    SendTransactions,
    SignMessage,
}

impl RelayMethod {
    pub fn name(&self) -> &'static str {
        match self {
            RelayMethod::SignIn => "signIn",
            RelayMethod::SendTransactions => "sendTransactions",
            RelayMethod::SignMessage => "signMessage",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            RelayMethod::SignIn => "/public/login.html",
            RelayMethod::SendTransactions => "/public/send.html",
            RelayMethod::SignMessage => "/public/sign.html",
        }
    }
}

/// Outbound message posted into the surface once it is ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    pub params: Value,
}

impl RelayEnvelope {
    /// Build a request envelope.
    ///
    /// Method params are flattened next to `id`, `state` and `callbackUrl`. A
    /// `callbackUrl` already present in `params` wins over the default.
    pub fn request(
        id: &str,
        method: RelayMethod,
        params: Value,
        state: Value,
        default_callback_url: Option<&str>,
    ) -> Self {
        let mut body = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        body.insert("id".to_string(), Value::String(id.to_string()));
        body.insert("state".to_string(), state);
        let callback = body
            .get("callbackUrl")
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| default_callback_url.map(|url| Value::String(url.to_string())))
            .unwrap_or(Value::Null);
        body.insert("callbackUrl".to_string(), callback);

        Self {
            kind: MESSAGE_TYPE.to_string(),
            method: method.name().to_string(),
            params: Value::Object(body),
        }
    }

    /// Correlation id of this request.
    pub fn id(&self) -> Option<&str> {
        self.params.get("id").and_then(Value::as_str)
    }
}

/// Message received from a surface, tagged with the origin it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    pub data: Value,
}

/// Parsed inbound message body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RelayReply {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl RelayReply {
    /// Parse `data`; anything without the relay tag is rejected.
    pub fn parse(data: &Value) -> Option<Self> {
        let reply: RelayReply = serde_json::from_value(data.clone()).ok()?;
        (reply.kind.as_deref() == Some(MESSAGE_TYPE)).then_some(reply)
    }

    pub fn is_close(&self) -> bool {
        self.action.as_deref() == Some("close")
    }

    /// Session fields the wallet wants merged into the cached view.
    pub fn state(&self) -> Option<&Map<String, Value>> {
        self.payload.as_ref()?.get("state")?.as_object()
    }
}

/// Params for `signIn`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_names: Option<Vec<String>>,
    /// Key the wallet should add for this client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Account entry in a sign-in reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    pub account_id: String,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInReply {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub accounts: Option<Vec<WalletAccount>>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Unsigned transaction handed to the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTransaction {
    pub signer_id: String,
    pub receiver_id: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendTransactionsRequest {
    pub transactions: Vec<RelayTransaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendTransactionsReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// Params for `signMessage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageRequest {
    pub message: String,
    pub recipient: String,
    pub nonce: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageReply {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}
