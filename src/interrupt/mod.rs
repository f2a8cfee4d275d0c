//! Interruptible suspension primitives.
//!
//! # Responsibilities
//! - Signal-once-wake-all waiting that an abort or fault can cut short
//! - Delayed callbacks without a dedicated blocked thread
//!
//! # Design Decisions
//! - A wait resolves exactly one way: signaled, aborted, faulted, or timed out
//! - Terminal errors come from the communication object being torn down, so
//!   waiters can tell a local abort from a remote fault

pub mod timer;
pub mod wait_object;

pub use timer::InterruptibleTimer;
pub use wait_object::InterruptibleWaitObject;
