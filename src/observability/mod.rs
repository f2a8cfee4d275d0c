//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Requestors, guard, fault helper, orchestrator produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Handled failures are logged at debug, abandoned work at warn
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
