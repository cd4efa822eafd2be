//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the node endpoint resolves for the selected network
//! - Validate value ranges (timeouts > 0) and URL syntax
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("network_id must not be empty")]
    EmptyNetworkId,

    #[error("no node endpoint for network '{0}' (set network.node_url)")]
    MissingNodeUrl(String),

    #[error("invalid URL in {field}: '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("relay.target_origin must be '*' or an origin, got '{0}'")]
    InvalidOrigin(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let network = &config.network;

    if network.network_id.trim().is_empty() {
        errors.push(ValidationError::EmptyNetworkId);
    }

    match network.resolved_node_url() {
        Some(url) => check_url(&mut errors, "network.node_url", &url),
        None => errors.push(ValidationError::MissingNodeUrl(network.network_id.clone())),
    }
    for url in &network.failover_urls {
        check_url(&mut errors, "network.failover_urls", url);
    }
    for (field, value) in [
        ("network.wallet_url", &network.wallet_url),
        ("network.helper_url", &network.helper_url),
        ("network.explorer_url", &network.explorer_url),
        ("relay.callback_url", &config.relay.callback_url),
    ] {
        if let Some(url) = value {
            check_url(&mut errors, field, url);
        }
    }
    check_url(&mut errors, "relay.widget_url", &config.relay.widget_url);

    let origin = &config.relay.target_origin;
    if origin != "*" {
        let valid = Url::parse(origin)
            .map(|u| u.origin().ascii_serialization() == origin.trim_end_matches('/'))
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if network.rpc_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("network.rpc_timeout_secs"));
    }
    if config.relay.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("relay.timeout_secs"));
    }
    if config.dispatch.block_freshness_secs == 0 {
        errors.push(ValidationError::ZeroValue("dispatch.block_freshness_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}
