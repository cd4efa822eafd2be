//! Remote node access.
//!
//! # Data Flow
//! ```text
//! TxDispatcher / NearClient
//!     → client.rs (typed calls: send_tx, tx, query, block)
//!     → transport.rs (JSON-RPC over HTTP, failover, per-call timeout)
//!     → node
//! ```
//!
//! # Design Decisions
//! - The node is an opaque request/response service; only fields the client needs are decoded
//! - Node-level errors are returned as data (`RpcError::Node`) and never retried
//! - Transport failures fail over to the next endpoint

pub mod client;
pub mod transport;
pub mod types;

pub use client::NodeClient;
pub use transport::{HttpTransport, RpcTransport};
pub use types::{AccessKeyView, BlockHeaderView, BlockReference, RpcError, RpcResult, WaitUntil};
