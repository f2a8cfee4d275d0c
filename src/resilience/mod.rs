//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical operation with caller timeout:
//!     → timeouts.rs (one TimeoutBudget for the whole operation)
//!     → pacing.rs (split the budget into bounded iteration windows)
//!     → On failure: retries.rs (retry only what the binder can handle)
//!     → composer.rs (chain sub-steps A → B → C under the same budget)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every wait has a deadline
//! - Budgets are shared and depleted, never renewed per retry
//! - Retried failures are traced, only the terminal outcome is surfaced

pub mod composer;
pub mod pacing;
pub mod retries;
pub mod timeouts;

pub use composer::OperationComposer;
pub use retries::RetryPolicy;
pub use timeouts::TimeoutBudget;
