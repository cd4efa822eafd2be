//! Wallet relay channel.
//!
//! # Responsibilities
//! - Open a wallet surface per request at the method's path
//! - Correlate replies to requests by UUID
//! - Filter inbound messages by origin and message tag
//! - Merge wallet-pushed session state before resolving the request
//!
//! # Data Flow
//! ```text
//! caller → WalletRelay::request
//!     → WalletSurface::open(widget_url + path)   (ready)
//!     → SurfaceHandle::post(envelope{id, params, state, callbackUrl})
//! surface → inbox → listener task
//!     → origin/tag filter → close | state merge → pending[id].send(payload)
//! ```
//!
//! # Design Decisions
//! - At most one request in flight; a new one fails the old with `Superseded`
//! - No intrinsic timeout: callers race the future against their own timer
//! - Dropping a request future removes its pending entry and closes its surface
//! - Wallet-reported errors and rejections are reply data, not `RelayError`s

pub mod channel;
pub mod protocol;
pub mod surface;

use thiserror::Error;

pub use channel::{StateUpdateCallback, WalletRelay};
pub use protocol::{
    InboundMessage, RelayEnvelope, RelayMethod, RelayReply, RelayTransaction,
    SendTransactionsReply, SendTransactionsRequest, SignInReply, SignInRequest, SignMessageReply,
    SignMessageRequest, WalletAccount, MESSAGE_TYPE,
};
pub use surface::{Inbox, SurfaceHandle, WalletSurface, WebSocketSurface};

/// Errors raised by the relay channel itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RelayError {
    #[error("wallet request superseded by a newer request")]
    Superseded,

    #[error("wallet request cancelled")]
    Cancelled,

    #[error("wallet relay closed")]
    Closed,

    #[error("wallet surface failed: {0}")]
    Surface(String),

    #[error("invalid wallet url: {0}")]
    InvalidUrl(String),

    #[error("malformed wallet reply: {0}")]
    InvalidReply(String),
}
