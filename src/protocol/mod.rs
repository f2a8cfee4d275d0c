//! Reliable messaging protocol checks consumed by the core.
//!
//! Wire formats stay with the transport; this module only sees what the
//! protocol layer extracted from a message (acknowledged ranges, response
//! kind, correlation) and decides whether the session may end cleanly.

pub mod ranges;
pub mod validation;

pub use ranges::{InvalidSequenceRange, SequenceRange, SequenceRangeCollection};
pub use validation::{
    validate_close_sequence_response, validate_final_ack, validate_final_ack_exists,
    validate_terminate_sequence_response, AcknowledgementInfo, ResponseInfo, SequenceResponse,
};
