//! JSON wire protocol for the collaboration channel.
//!
//! Every frame in both directions is one JSON object:
//!
//! ```text
//! { "type": <string discriminator>, "data": <object payload> }
//! ```
//!
//! Inbound frames are decoded in two steps (envelope first, then a typed
//! payload keyed on `type`) so that an unrecognized `type` degrades to
//! [`ServerMessage::Unknown`] instead of a decode failure, and a malformed
//! payload is a per-message error that never tears down the connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use verso_core::{Column, Comment, CommentType, Role, User};

/// Protocol errors. All are per-message; none are fatal to the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
    #[error("malformed `{msg_type}` payload: {source}")]
    MalformedPayload {
        msg_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The outer `{ type, data }` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(msg_type: impl Into<String>, data: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            data,
        }
    }

    /// Serialize to a wire frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parse a wire frame. Payload contents are not validated here.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::MalformedEnvelope)
    }
}

// ───────────────────────────────────────────────────────────────────
// Payloads
// ───────────────────────────────────────────────────────────────────

/// An in-place line replacement.
///
/// Outbound frames omit `user_id`; the server stamps it before relaying, and
/// the client uses it to discard echoes of its own edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditPayload {
    pub line_number: usize,
    pub content: String,
    pub edit_type: Column,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A comment submission. The server assigns the id and echoes back a full
/// [`Comment`]; the draft carries only what the author chose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub line_number: usize,
    pub content: String,
    pub comment_type: CommentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJoinPayload {
    pub user_id: String,
    pub user_name: String,
    pub user_role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeavePayload {
    pub user_id: String,
}

/// Join-time roster snapshot. The server may attach further session fields;
/// only the roster concerns the client, the rest is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatePayload {
    #[serde(default)]
    pub active_users: Vec<User>,
}

/// Wholesale column snapshot for late joiners and post-reconnect resync.
/// Each column is independent; an absent column is left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSyncPayload {
    #[serde(default, rename = "en", skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<String>>,
    #[serde(default, rename = "cn", skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditConfirmedPayload {
    pub line_number: usize,
    pub edit_type: Column,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Relayed caret position of another participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPayload {
    pub user_id: String,
    pub line_number: usize,
    #[serde(default)]
    pub position: usize,
}

// ───────────────────────────────────────────────────────────────────
// Typed messages
// ───────────────────────────────────────────────────────────────────

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Edit {
        line_number: usize,
        content: String,
        edit_type: Column,
    },
    Comment(CommentDraft),
    Cursor {
        line_number: usize,
        position: usize,
    },
}

impl ClientMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            ClientMessage::Edit { .. } => "edit",
            ClientMessage::Comment(_) => "comment",
            ClientMessage::Cursor { .. } => "cursor",
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let data = match self {
            ClientMessage::Edit {
                line_number,
                content,
                edit_type,
            } => serde_json::to_value(EditPayload {
                line_number: *line_number,
                content: content.clone(),
                edit_type: *edit_type,
                user_id: None,
                user_name: None,
                timestamp: None,
            }),
            ClientMessage::Comment(draft) => serde_json::to_value(draft),
            ClientMessage::Cursor {
                line_number,
                position,
            } => serde_json::to_value(serde_json::json!({
                "line_number": line_number,
                "position": position,
            })),
        }
        .map_err(ProtocolError::Encode)?;

        Ok(Envelope::new(self.msg_type(), data))
    }

    /// Serialize straight to a wire frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.to_envelope()?.encode()
    }
}

/// Messages the server delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Edit(EditPayload),
    Comment(Comment),
    UserJoin(UserJoinPayload),
    UserLeave(UserLeavePayload),
    SessionState(SessionStatePayload),
    ContentSync(ContentSyncPayload),
    EditConfirmed(EditConfirmedPayload),
    Cursor(CursorPayload),
    Error(ErrorPayload),
    /// Forward-compatibility: a `type` this client does not recognize.
    /// Logged and ignored, never fatal.
    Unknown(String),
}

impl ServerMessage {
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        fn payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ProtocolError> {
            serde_json::from_value(envelope.data.clone()).map_err(|source| {
                ProtocolError::MalformedPayload {
                    msg_type: envelope.msg_type.clone(),
                    source,
                }
            })
        }

        Ok(match envelope.msg_type.as_str() {
            "edit" => ServerMessage::Edit(payload(envelope)?),
            "comment" => ServerMessage::Comment(payload(envelope)?),
            "user_join" => ServerMessage::UserJoin(payload(envelope)?),
            "user_leave" => ServerMessage::UserLeave(payload(envelope)?),
            "session_state" => ServerMessage::SessionState(payload(envelope)?),
            "content_sync" => ServerMessage::ContentSync(payload(envelope)?),
            "edit_confirmed" => ServerMessage::EditConfirmed(payload(envelope)?),
            "cursor" => ServerMessage::Cursor(payload(envelope)?),
            "error" => ServerMessage::Error(payload(envelope)?),
            other => ServerMessage::Unknown(other.to_string()),
        })
    }

    /// Parse a raw wire frame into a typed message.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(&Envelope::decode(raw)?)
    }
}
