//! Transaction actions.
//!
//! Actions travel two ways: as JSON (`{"type": ..., "params": {...}}`, amounts as
//! decimal strings) to the wallet relay, and borsh-encoded inside locally signed
//! transactions.

use base64::Engine;
use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transaction::PublicKey;

/// Gas attached to a function call when none is given (30 Tgas).
pub const DEFAULT_FUNCTION_CALL_GAS: u64 = 30_000_000_000_000;

/// A single instruction inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all_fields = "camelCase")]
pub enum Action {
    CreateAccount,
    DeployContract {
        #[serde(with = "base64_bytes")]
        code: Vec<u8>,
    },
    FunctionCall {
        method_name: String,
        #[serde(default = "empty_args")]
        args: Value,
        #[serde(with = "decimal")]
        gas: u64,
        #[serde(with = "decimal")]
        deposit: u128,
    },
    Transfer {
        #[serde(with = "decimal")]
        deposit: u128,
    },
    Stake {
        #[serde(with = "decimal")]
        stake: u128,
        public_key: PublicKey,
    },
    AddKey {
        public_key: PublicKey,
        access_key: AccessKey,
    },
    DeleteKey {
        public_key: PublicKey,
    },
    DeleteAccount {
        beneficiary_id: String,
    },
}

fn empty_args() -> Value {
    Value::Object(Default::default())
}

impl Action {
    pub fn create_account() -> Self {
        Action::CreateAccount
    }

    pub fn deploy_contract(code: Vec<u8>) -> Self {
        Action::DeployContract { code }
    }

    /// Function call with default gas and no deposit.
    pub fn function_call(method_name: impl Into<String>, args: Value) -> Self {
        Action::FunctionCall {
            method_name: method_name.into(),
            args,
            gas: DEFAULT_FUNCTION_CALL_GAS,
            deposit: 0,
        }
    }

    /// Override gas on a function call; other actions are returned unchanged.
    pub fn with_gas(mut self, new_gas: u64) -> Self {
        if let Action::FunctionCall { gas, .. } = &mut self {
            *gas = new_gas;
        }
        self
    }

    /// Override the attached deposit on a function call or transfer.
    pub fn with_deposit(mut self, amount: u128) -> Self {
        match &mut self {
            Action::FunctionCall { deposit, .. } | Action::Transfer { deposit } => {
                *deposit = amount
            }
            _ => {}
        }
        self
    }

    pub fn transfer(deposit: u128) -> Self {
        Action::Transfer { deposit }
    }

    pub fn stake(stake: u128, public_key: PublicKey) -> Self {
        Action::Stake { stake, public_key }
    }

    pub fn add_full_access_key(public_key: PublicKey) -> Self {
        Action::AddKey {
            public_key,
            access_key: AccessKey {
                nonce: 0,
                permission: AccessKeyPermission::FullAccess,
            },
        }
    }

    pub fn add_limited_access_key(
        public_key: PublicKey,
        receiver_id: impl Into<String>,
        allowance: Option<u128>,
        method_names: Vec<String>,
    ) -> Self {
        Action::AddKey {
            public_key,
            access_key: AccessKey {
                nonce: 0,
                permission: AccessKeyPermission::FunctionCall(FunctionCallPermission {
                    receiver_id: receiver_id.into(),
                    allowance,
                    method_names,
                }),
            },
        }
    }

    pub fn delete_key(public_key: PublicKey) -> Self {
        Action::DeleteKey { public_key }
    }

    pub fn delete_account(beneficiary_id: impl Into<String>) -> Self {
        Action::DeleteAccount {
            beneficiary_id: beneficiary_id.into(),
        }
    }

    /// Tokens attached to the action (function-call deposit or transfer amount).
    pub fn deposit(&self) -> u128 {
        match self {
            Action::FunctionCall { deposit, .. } | Action::Transfer { deposit } => *deposit,
            _ => 0,
        }
    }

    /// Whether a function-call (limited) access key may authorize this action.
    pub fn is_limited_key_safe(&self) -> bool {
        matches!(self, Action::FunctionCall { .. })
    }

    /// Variant name as used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateAccount => "CreateAccount",
            Action::DeployContract { .. } => "DeployContract",
            Action::FunctionCall { .. } => "FunctionCall",
            Action::Transfer { .. } => "Transfer",
            Action::Stake { .. } => "Stake",
            Action::AddKey { .. } => "AddKey",
            Action::DeleteKey { .. } => "DeleteKey",
            Action::DeleteAccount { .. } => "DeleteAccount",
        }
    }
}

impl BorshSerialize for Action {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        match self {
            Action::CreateAccount => BorshSerialize::serialize(&0u8, writer),
            Action::DeployContract { code } => {
                BorshSerialize::serialize(&1u8, writer)?;
                BorshSerialize::serialize(code, writer)
            }
            Action::FunctionCall {
                method_name,
                args,
                gas,
                deposit,
            } => {
                let args = serde_json::to_vec(args).map_err(borsh::io::Error::other)?;
                BorshSerialize::serialize(&2u8, writer)?;
                BorshSerialize::serialize(method_name, writer)?;
                BorshSerialize::serialize(&args, writer)?;
                BorshSerialize::serialize(gas, writer)?;
                BorshSerialize::serialize(deposit, writer)
            }
            Action::Transfer { deposit } => {
                BorshSerialize::serialize(&3u8, writer)?;
                BorshSerialize::serialize(deposit, writer)
            }
            Action::Stake { stake, public_key } => {
                BorshSerialize::serialize(&4u8, writer)?;
                BorshSerialize::serialize(stake, writer)?;
                BorshSerialize::serialize(public_key, writer)
            }
            Action::AddKey {
                public_key,
                access_key,
            } => {
                BorshSerialize::serialize(&5u8, writer)?;
                BorshSerialize::serialize(public_key, writer)?;
                BorshSerialize::serialize(access_key, writer)
            }
            Action::DeleteKey { public_key } => {
                BorshSerialize::serialize(&6u8, writer)?;
                BorshSerialize::serialize(public_key, writer)
            }
            Action::DeleteAccount { beneficiary_id } => {
                BorshSerialize::serialize(&7u8, writer)?;
                BorshSerialize::serialize(beneficiary_id, writer)
            }
        }
    }
}

/// Access key attached by an `AddKey` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize)]
pub struct AccessKey {
    #[serde(default)]
    pub nonce: u64,
    pub permission: AccessKeyPermission,
}

/// Either full access or a function-call allowance scoped to one receiver.
///
/// JSON form is the string `"FullAccess"` or a `{receiverId, allowance, methodNames}` object.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessKeyPermission {
    FunctionCall(FunctionCallPermission),
    FullAccess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallPermission {
    #[serde(default, with = "decimal_opt", skip_serializing_if = "Option::is_none")]
    pub allowance: Option<u128>,
    pub receiver_id: String,
    #[serde(default)]
    pub method_names: Vec<String>,
}

impl Serialize for AccessKeyPermission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AccessKeyPermission::FullAccess => serializer.serialize_str("FullAccess"),
            AccessKeyPermission::FunctionCall(p) => Serialize::serialize(p, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AccessKeyPermission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) if s == "FullAccess" => Ok(AccessKeyPermission::FullAccess),
            other => serde_json::from_value(other)
                .map(AccessKeyPermission::FunctionCall)
                .map_err(serde::de::Error::custom),
        }
    }
}

impl BorshSerialize for AccessKeyPermission {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        match self {
            AccessKeyPermission::FunctionCall(p) => {
                BorshSerialize::serialize(&0u8, writer)?;
                BorshSerialize::serialize(p, writer)
            }
            AccessKeyPermission::FullAccess => BorshSerialize::serialize(&1u8, writer),
        }
    }
}

/// Integers carried as decimal strings; numbers are accepted on input.
mod decimal {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => s.parse().map_err(D::Error::custom),
            serde_json::Value::Number(n) => n.to_string().parse().map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("expected amount, got {other}"))),
        }
    }
}

mod decimal_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => super::decimal::deserialize(v)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Decode base64 contract arguments into JSON, as accepted by `function_call` callers.
pub fn args_from_base64(args_base64: &str) -> Result<Value, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(args_base64)
        .map_err(|e| format!("invalid base64 args: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("args are not JSON: {e}"))
}
