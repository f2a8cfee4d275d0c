//! Validation of session-ending responses and final acknowledgements.
//!
//! A session that sent `last` messages may only end once the peer has
//! acknowledged exactly `[1, last]` (nothing, when `last` is zero) in an
//! acknowledgement marked final.

use serde::{Deserialize, Serialize};

use crate::channel::message::MessageId;
use crate::error::ProtocolFault;
use crate::protocol::ranges::SequenceRangeCollection;

pub const CLOSE_SEQUENCE: &str = "CloseSequence";
pub const TERMINATE_SEQUENCE: &str = "TerminateSequence";
pub const CLOSE_SEQUENCE_RESPONSE_ACTION: &str = "http://docs.oasis-open.org/ws-rx/wsrm/200702/CloseSequenceResponse";
pub const TERMINATE_SEQUENCE_RESPONSE_ACTION: &str =
    "http://docs.oasis-open.org/ws-rx/wsrm/200702/TerminateSequenceResponse";

/// An acknowledgement carried by a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgementInfo {
    pub is_final: bool,
    pub ranges: SequenceRangeCollection,
}

/// Which session-ending response a message carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceResponse {
    CloseSequence { relates_to: Option<MessageId> },
    TerminateSequence { relates_to: Option<MessageId> },
}

/// What the protocol layer extracted from a response message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub action: String,
    pub response: Option<SequenceResponse>,
    pub acknowledgement: Option<AcknowledgementInfo>,
    /// The peer reported the sequence as unknown.
    pub unknown_sequence: bool,
}

/// The acknowledgement must exist and be final.
pub fn validate_final_ack_exists(sequence: &str, ack: Option<&AcknowledgementInfo>) -> Result<(), ProtocolFault> {
    final_ack(sequence, ack).map(|_| ())
}

fn final_ack<'a>(
    sequence: &str,
    ack: Option<&'a AcknowledgementInfo>,
) -> Result<&'a AcknowledgementInfo, ProtocolFault> {
    match ack {
        Some(ack) if ack.is_final => Ok(ack),
        _ => Err(ProtocolFault::MissingFinalAck {
            sequence: sequence.to_string(),
        }),
    }
}

/// The final acknowledgement must cover exactly `[1, last]`, or nothing
/// when `last` is zero.
pub fn validate_final_ack(sequence: &str, info: &ResponseInfo, last: u64) -> Result<(), ProtocolFault> {
    let ack = final_ack(sequence, info.acknowledgement.as_ref())?;

    let exact = if last == 0 {
        ack.ranges.is_empty()
    } else {
        ack.ranges.len() == 1
            && ack
                .ranges
                .get(0)
                .is_some_and(|range| range.lower() == 1 && range.upper() == last)
    };

    if exact {
        Ok(())
    } else {
        Err(ProtocolFault::InvalidAcknowledgement {
            sequence: sequence.to_string(),
            ranges: ack.ranges.to_string(),
        })
    }
}

/// Validate the reply to a TerminateSequence request `request_id`.
/// An unknown-sequence reply is accepted: the peer already forgot us.
pub fn validate_terminate_sequence_response(
    sequence: &str,
    request_id: &MessageId,
    info: &ResponseInfo,
    last: u64,
) -> Result<(), ProtocolFault> {
    if info.unknown_sequence {
        return Ok(());
    }

    match info.response {
        Some(SequenceResponse::TerminateSequence { relates_to }) => {
            if relates_to.as_ref() != Some(request_id) {
                return Err(ProtocolFault::WrongRelatesTo {
                    sequence: sequence.to_string(),
                    request: TERMINATE_SEQUENCE.to_string(),
                });
            }
            validate_final_ack(sequence, info, last)
        }
        _ => Err(unexpected(sequence, TERMINATE_SEQUENCE, info, TERMINATE_SEQUENCE_RESPONSE_ACTION)),
    }
}

/// Validate the reply to a CloseSequence request `request_id`.
pub fn validate_close_sequence_response(
    sequence: &str,
    request_id: &MessageId,
    info: &ResponseInfo,
    last: u64,
) -> Result<(), ProtocolFault> {
    match info.response {
        Some(SequenceResponse::CloseSequence { relates_to }) => {
            if relates_to.as_ref() != Some(request_id) {
                return Err(ProtocolFault::WrongRelatesTo {
                    sequence: sequence.to_string(),
                    request: CLOSE_SEQUENCE.to_string(),
                });
            }
            validate_final_ack(sequence, info, last)
        }
        _ => Err(unexpected(sequence, CLOSE_SEQUENCE, info, CLOSE_SEQUENCE_RESPONSE_ACTION)),
    }
}

fn unexpected(sequence: &str, request: &str, info: &ResponseInfo, expected: &str) -> ProtocolFault {
    ProtocolFault::UnexpectedResponse {
        sequence: sequence.to_string(),
        request: request.to_string(),
        action: info.action.clone(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ranges::SequenceRange;

    fn info_with(ranges: &[(u64, u64)], is_final: bool) -> ResponseInfo {
        ResponseInfo {
            acknowledgement: Some(AcknowledgementInfo {
                is_final,
                ranges: ranges.iter().map(|&(l, u)| SequenceRange::new(l, u)).collect(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn final_ack_must_cover_exactly_everything_sent() {
        let missing_three = validate_final_ack("seq", &info_with(&[(1, 2)], true), 3).unwrap_err();
        assert!(matches!(missing_three, ProtocolFault::InvalidAcknowledgement { ref ranges, .. } if ranges == "[1-2]"));

        assert!(validate_final_ack("seq", &info_with(&[(1, 3)], true), 3).is_ok());
        assert!(validate_final_ack("seq", &info_with(&[], true), 0).is_ok());
        assert!(validate_final_ack("seq", &info_with(&[(1, 1)], true), 0).is_err());
        assert!(validate_final_ack("seq", &info_with(&[(1, 2), (4, 5)], true), 5).is_err());
    }

    #[test]
    fn decoded_ack_with_touching_ranges_is_exact() {
        let json = r#"{
            "action": "",
            "response": null,
            "acknowledgement": {
                "is_final": true,
                "ranges": [{"lower": 1, "upper": 2}, {"lower": 3, "upper": 3}]
            },
            "unknown_sequence": false
        }"#;
        let info: ResponseInfo = serde_json::from_str(json).unwrap();
        assert!(validate_final_ack("seq", &info, 3).is_ok());

        let inverted = json.replace(r#"{"lower": 3, "upper": 3}"#, r#"{"lower": 5, "upper": 0}"#);
        assert!(serde_json::from_str::<ResponseInfo>(&inverted).is_err());
    }

    #[test]
    fn non_final_ack_is_missing() {
        let err = validate_final_ack("seq", &info_with(&[(1, 3)], false), 3).unwrap_err();
        assert!(matches!(err, ProtocolFault::MissingFinalAck { .. }));

        let err = validate_final_ack_exists("seq", None).unwrap_err();
        assert!(matches!(err, ProtocolFault::MissingFinalAck { .. }));
    }

    #[test]
    fn terminate_response_checks() {
        let request = MessageId::new();

        let mut info = info_with(&[(1, 2)], true);
        info.action = TERMINATE_SEQUENCE_RESPONSE_ACTION.into();
        info.response = Some(SequenceResponse::TerminateSequence {
            relates_to: Some(request),
        });
        assert!(validate_terminate_sequence_response("seq", &request, &info, 2).is_ok());

        let other = MessageId::new();
        let err = validate_terminate_sequence_response("seq", &other, &info, 2).unwrap_err();
        assert!(matches!(err, ProtocolFault::WrongRelatesTo { .. }));

        let unknown = ResponseInfo {
            unknown_sequence: true,
            ..Default::default()
        };
        assert!(validate_terminate_sequence_response("seq", &request, &unknown, 2).is_ok());
    }

    #[test]
    fn close_response_must_be_close_response() {
        let request = MessageId::new();
        let mut info = info_with(&[(1, 1)], true);
        info.action = TERMINATE_SEQUENCE_RESPONSE_ACTION.into();
        info.response = Some(SequenceResponse::TerminateSequence {
            relates_to: Some(request),
        });

        let err = validate_close_sequence_response("seq", &request, &info, 1).unwrap_err();
        assert!(matches!(err, ProtocolFault::UnexpectedResponse { ref expected, .. } if expected == CLOSE_SEQUENCE_RESPONSE_ACTION));

        info.response = Some(SequenceResponse::CloseSequence {
            relates_to: Some(request),
        });
        assert!(validate_close_sequence_response("seq", &request, &info, 1).is_ok());
    }
}
