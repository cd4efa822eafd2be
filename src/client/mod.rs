//! Client facade.
//!
//! # Responsibilities
//! - Compose one state store, one ledger and one relay channel per client
//! - Select the isolation mode: durable, isolated in-memory or host-owned
//! - Sign-in, sign-out, message signing and network switching
//! - Expose account and transaction events that survive network switches
//!
//! # Data Flow
//! ```text
//! NearClient
//!     → ArcSwap<NetworkSession> (store, ledger, node client, dispatcher)
//!     → WalletRelay (shared across networks; state pushes land in the current store)
//! ```
//!
//! # Design Decisions
//! - Per-network pieces are swapped atomically on network switch
//! - Clients never share in-memory state; only a durable directory is shared

pub mod facade;
pub mod session;
pub mod types;

pub use facade::{ClientBuilder, NearClient};
pub use session::{StateMode, TransportFactory};
pub use types::{
    AuthStatus, Selection, SignInOutcome, SignInParams, SignMessageParams, SignedMessage,
};
