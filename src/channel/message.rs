//! Opaque message values exchanged with a binder.
//!
//! The core never inspects bodies; it only reads and stamps the addressing
//! fields it needs for request/reply correlation.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// WS-Addressing anonymous URI.
pub const ANONYMOUS_URI: &str = "http://www.w3.org/2005/08/addressing/anonymous";

/// Unique identifier correlating a request with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:uuid:{}", self.0)
    }
}

/// An endpoint address (URI only; reference parameters are out of scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointAddress {
    uri: String,
}

impl EndpointAddress {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_URI)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_anonymous(&self) -> bool {
        self.uri == ANONYMOUS_URI
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Addressing vocabulary used by the session. Only affects how ReplyTo is
/// stamped on correlated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressingVersion {
    /// WS-Addressing August 2004: ReplyTo is always sent.
    August2004,
    /// WS-Addressing 1.0: an anonymous ReplyTo is omitted.
    #[default]
    V10,
}

/// A message as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub action: String,
    pub message_id: Option<MessageId>,
    pub relates_to: Option<MessageId>,
    pub reply_to: Option<EndpointAddress>,
    pub body: Vec<u8>,
}

impl Message {
    /// Create a message with the given action and body and no addressing.
    pub fn new(action: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            action: action.into(),
            message_id: None,
            relates_to: None,
            reply_to: None,
            body: body.into(),
        }
    }

    /// Create a reply correlated to `request`.
    pub fn reply_to(request: &Message, action: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let mut reply = Self::new(action, body);
        reply.relates_to = request.message_id;
        reply
    }

    /// True when this message correlates to `id`.
    pub fn relates_to_id(&self, id: &MessageId) -> bool {
        self.relates_to.as_ref() == Some(id)
    }
}
