//! Transaction history ledger.
//!
//! # Responsibilities
//! - Keep one record per submission attempt, keyed by client-generated id
//! - Merge partial updates field-wise and stamp every mutation
//! - Freeze records once they reach a final state
//! - Persist the full mapping and notify subscribers
//!
//! # Design Decisions
//! - Updates to a finalized record are ignored (logged, `None` returned)
//! - A terminal status implies `final_state`, whatever the patch says

pub mod ledger;
pub mod types;

pub use ledger::{TxHistory, TxLedger};
pub use types::{TxRecord, TxStatus, TxUpdate};
