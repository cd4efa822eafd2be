//! Transaction dispatch.
//!
//! # Responsibilities
//! - Choose between local signing and the wallet relay
//! - Maintain the nonce and block caches on the local path
//! - Drive the ledger record through every step
//!
//! # Data Flow
//! ```text
//! SendTxRequest
//!     → select_path(session, receiver, actions)
//!     → Local: Pending → nonce (cache | view_access_key) → block (cache | block final)
//!              → nonce+1 → sign → Pending{hash, signature} → send_tx → Included
//!              → spawned tx poll → Executed | ErrorAfterIncluded
//!     → Relay: Pending → sendTransactions (bounded by relay timeout)
//!              → Executed | RejectedByUser | Error
//! ```
//!
//! # Design Decisions
//! - The nonce is reserved before submission and never reused, even on failure
//! - A failed submission is recorded as `Error` and not retried

pub mod dispatcher;
pub mod eligibility;

pub use dispatcher::{generate_tx_id, Dispatched, SendTxRequest, TxDispatcher};
pub use eligibility::{select_path, SigningPath};
