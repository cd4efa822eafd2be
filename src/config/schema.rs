//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::rpc::types::WaitUntil;

/// Network selected when nothing else is configured.
pub const DEFAULT_NETWORK_ID: &str = "mainnet";

/// Wallet surface the relay channel loads by default.
pub const DEFAULT_WIDGET_URL: &str = "https://wallet.intear.tech";

/// Known network presets: `(network_id, node_url)`.
pub const NETWORK_PRESETS: &[(&str, &str)] = &[
    ("mainnet", "https://rpc.mainnet.fastnear.com/"),
    ("testnet", "https://rpc.testnet.fastnear.com/"),
];

/// Root configuration for the client.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Network selection and node endpoints.
    pub network: NetworkConfig,

    /// Wallet relay settings.
    pub relay: RelayConfig,

    /// Where session state and history are kept.
    pub storage: StorageConfig,

    /// Transaction dispatch policy.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network identifier (e.g., "mainnet", "testnet").
    pub network_id: String,

    /// JSON-RPC node endpoint. Falls back to the preset for known networks.
    pub node_url: Option<String>,

    /// Failover JSON-RPC endpoints, tried in order.
    pub failover_urls: Vec<String>,

    pub wallet_url: Option<String>,
    pub helper_url: Option<String>,
    pub explorer_url: Option<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::for_network(DEFAULT_NETWORK_ID)
    }
}

impl NetworkConfig {
    /// Configuration for `network_id`. The node endpoint resolves to the preset, if any.
    pub fn for_network(network_id: &str) -> Self {
        Self {
            network_id: network_id.to_string(),
            node_url: None,
            failover_urls: Vec::new(),
            wallet_url: None,
            helper_url: None,
            explorer_url: None,
            rpc_timeout_secs: 10,
        }
    }

    /// The node endpoint in effect: explicit URL first, then the preset.
    pub fn resolved_node_url(&self) -> Option<String> {
        self.node_url
            .clone()
            .or_else(|| preset_node_url(&self.network_id).map(str::to_string))
    }

    /// Every endpoint to try, primary first.
    pub fn endpoints(&self) -> Vec<String> {
        self.resolved_node_url()
            .into_iter()
            .chain(self.failover_urls.iter().cloned())
            .collect()
    }
}

/// Look up the preset node URL for a network.
pub fn preset_node_url(network_id: &str) -> Option<&'static str> {
    NETWORK_PRESETS
        .iter()
        .find(|(id, _)| *id == network_id)
        .map(|(_, url)| *url)
}

/// Wallet relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the wallet surface.
    pub widget_url: String,

    /// Origin inbound messages must come from. `"*"` accepts any origin.
    pub target_origin: String,

    /// Callback URL forwarded to the wallet with every request.
    pub callback_url: Option<String>,

    /// Upper bound on one relay round trip, enforced by the dispatcher.
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            widget_url: DEFAULT_WIDGET_URL.to_string(),
            target_origin: "*".to_string(),
            callback_url: None,
            timeout_secs: 300,
        }
    }
}

/// Persistence mode for session state.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Durable,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,

    /// Root directory for durable state; one subdirectory per network.
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Durable,
            dir: ".near-client".to_string(),
        }
    }
}

/// Transaction dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Wait policy used when a request does not specify one.
    pub default_wait_until: WaitUntil,

    /// How long a cached block reference may be used for signing.
    pub block_freshness_secs: u64,

    /// Poll for execution after a locally signed transaction is included.
    pub poll_execution: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_wait_until: WaitUntil::Included,
            block_freshness_secs: 6 * 60 * 60,
            poll_execution: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
