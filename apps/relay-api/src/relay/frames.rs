//! Wire frames exchanged with chat clients.

use serde::{Deserialize, Serialize};

use crate::models::message::Message;

/// Body of the synthetic frame announcing a peer's departure.
pub const DEPARTURE_NOTICE: &str = "left the chat";

/// Recognized message kinds. The field is an open string on the wire; other
/// values are stored and relayed untouched.
pub struct MessageKind;

impl MessageKind {
    pub const TEXT: &'static str = "text";
    pub const SYSTEM: &'static str = "system";
}

/// A frame received from a client. Carries no sender field; the sender
/// identity comes from the session, never from the wire.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A frame sent to clients. History replay, live relay, and departure
/// notices all share this shape.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
    pub client_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl OutboundFrame {
    pub fn from_message(message: &Message) -> Self {
        Self {
            client_id: message.client_id.clone(),
            message: message.body.clone(),
            kind: message.kind.clone(),
        }
    }

    pub fn departure(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            message: DEPARTURE_NOTICE.to_string(),
            kind: MessageKind::SYSTEM.to_string(),
        }
    }

    /// Serialized form sent over the socket. A frame is three strings;
    /// serialization cannot fail.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("frame serialization")
    }
}
