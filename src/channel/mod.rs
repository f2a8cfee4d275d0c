//! Channel subsystem: the boundary between the core and a transport.
//!
//! # Data Flow
//! ```text
//! Requestor / fault helper / orchestrator
//!     → binder.rs (ChannelBinder: send, request, try_receive, open/close)
//!     → transport (out of scope; simulated.rs stands in for it)
//!     ← Message values (message.rs), correlated by MessageId
//! ```
//!
//! # Design Decisions
//! - The core only reads and stamps addressing fields; bodies are opaque
//! - Binder identity is a process-unique id, not object identity

pub mod binder;
pub mod message;
pub mod output;
pub mod simulated;

pub use binder::{BinderId, ChannelBinder, CommunicationObject, CommunicationState, MaskingMode, RequestContext};
pub use message::{AddressingVersion, EndpointAddress, Message, MessageId};
pub use output::ReliableOutput;
pub use simulated::SimulatedBinder;
