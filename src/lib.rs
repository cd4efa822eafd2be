//! NEAR client SDK with local signing and wallet relay.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller
//!     │
//!     ▼
//!  ┌──────────────────────────── NearClient ─────────────────────────────┐
//!  │                                                                     │
//!  │   ┌──────────────┐      ┌───────────────┐      ┌────────────────┐   │
//!  │   │ TxDispatcher │─────▶│  StateStore   │      │   TxLedger     │   │
//!  │   │ local|relay  │      │ session+cache │      │ history+events │   │
//!  │   └──────┬───────┘      └───────────────┘      └────────────────┘   │
//!  │          │                                              ▲           │
//!  │          ├──── local ──▶ NodeClient (send_tx, tx) ──────┤           │
//!  │          └──── relay ──▶ WalletRelay ──▶ surface ───────┘           │
//!  │                                                                     │
//!  │   Cross-cutting: config · observability · storage · events · clock  │
//!  └─────────────────────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod client;
pub mod dispatch;
pub mod history;
pub mod relay;
pub mod state;

// Chain access
pub mod rpc;
pub mod transaction;

// Cross-cutting concerns
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod observability;
pub mod storage;

pub use client::{ClientBuilder, NearClient, StateMode};
pub use config::ClientConfig;
pub use dispatch::{Dispatched, SendTxRequest, SigningPath};
pub use error::{ClientError, ClientResult};
pub use history::{TxRecord, TxStatus};
pub use state::SessionState;
pub use transaction::Action;
