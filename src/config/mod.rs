//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated)
//!     → NearClient (network section swapped atomically on network switch)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Known networks resolve their node endpoint from presets
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClientConfig, DispatchConfig, NetworkConfig, ObservabilityConfig, RelayConfig, StorageConfig,
    StorageMode,
};
