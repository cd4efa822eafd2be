//! Session state store.
//!
//! # Responsibilities
//! - Hold the current session for exactly one network
//! - Keep derived fields consistent (`public_key` follows `private_key`)
//! - Persist through a storage backend or a host-provided source
//! - Notify listeners synchronously on every write
//! - Own the nonce/block cache used for local signing
//!
//! # Design Decisions
//! - `LocalStateStore` covers durable and volatile modes; only the backend differs
//! - `ExternalStateStore` polls the host on read, so it never serves stale sessions
//! - A changed private key invalidates the cached nonce

pub mod cache;
pub mod external;
pub mod local;
pub mod store;
pub mod types;

pub use cache::ChainCache;
pub use external::{ExternalStateSource, ExternalStateStore, SourceError};
pub use local::LocalStateStore;
pub use store::{StateListener, StateStore};
pub use types::{CachedBlock, SessionState, StateError};
