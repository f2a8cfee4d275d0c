//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Admission (guard.rs):
//!     enter → protected work → exit; close drains to zero
//!
//! Session (session.rs):
//!     open binder → open session (roll back binder on failure)
//!     close session → close binder (one shared budget)
//! ```
//!
//! # Design Decisions
//! - Ordered open: transport first, then the session on top of it
//! - Ordered close: session first, then transport
//! - Close has timeout; abort never waits

pub mod guard;
pub mod session;

pub use guard::{Guard, GuardPermit};
pub use session::{ReliableSession, SessionOrchestrator};
