//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters via the `metrics` facade)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`tx_id`, `method`, `network_id`) instead of formatted strings
//! - Key material is never logged

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
