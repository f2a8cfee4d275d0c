//! Reliable session coordination library.
//!
//! Sits between an application exchanging correlated messages and an
//! unreliable, session-oriented transport (a [`ChannelBinder`]).

pub mod blocking;
pub mod channel;
pub mod config;
pub mod error;
pub mod fault;
pub mod interrupt;
pub mod lifecycle;
pub mod observability;
pub mod protocol;
pub mod requestor;
pub mod resilience;

pub use channel::{ChannelBinder, Message, MessageId, SimulatedBinder};
pub use config::ReliableSessionConfig;
pub use error::{ProtocolFault, SessionError, SessionResult};
pub use fault::{FaultHelper, ReplyFaultHelper, SendFaultHelper};
pub use interrupt::{InterruptibleTimer, InterruptibleWaitObject};
pub use lifecycle::{Guard, ReliableSession, SessionOrchestrator};
pub use requestor::{
    ReliableRequestor, RequestReliableRequestor, RequestTemplate, SendReceiveReliableRequestor,
    SendWaitReliableRequestor,
};
pub use resilience::{OperationComposer, RetryPolicy, TimeoutBudget};
