//! Wire types exchanged between browser clients and the relay.
//!
//! Inbound frames are decoded exactly once, at the boundary, into a
//! [`ClientEvent`]. Outbound frames are built as [`ServerEvent`]s. Both
//! use the adjacently tagged form `{"event": "...", "data": {...}}`.

use chrono::Utc;
use lanchat_types::{LanChatError, Result};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as fractional seconds since the Unix epoch,
/// millisecond precision (the resolution browsers report).
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// An end-to-end encrypted chat message as relayed between peers.
///
/// The relay never sees plaintext: `content`, `iv` and `tag` are the
/// base64url AES-GCM output and `hmac` covers the other six fields.
/// `id` doubles as the replay nonce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub iv: String,
    pub tag: String,
    pub hmac: String,
    pub timestamp: f64,
}

/// Field order of the HMAC input. Must match what browser clients
/// produce with `JSON.stringify`.
#[derive(Serialize)]
struct HmacInput<'a> {
    id: &'a str,
    sender: &'a str,
    content: &'a str,
    iv: &'a str,
    tag: &'a str,
    #[serde(serialize_with = "serialize_js_number")]
    timestamp: f64,
}

/// Serializes a float the way JavaScript prints numbers for the
/// common cases: integral values carry no trailing `.0`.
fn serialize_js_number<S: Serializer>(value: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
    const SAFE_INT: f64 = 9_007_199_254_740_991.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= SAFE_INT {
        s.serialize_i64(*value as i64)
    } else {
        s.serialize_f64(*value)
    }
}

impl ChatMessage {
    /// Returns the exact byte string the HMAC is computed over: the
    /// compact JSON object `{id, sender, content, iv, tag, timestamp}`
    /// in that order.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::DecodeError`] if the timestamp is not a
    /// finite number.
    pub fn hmac_input(&self) -> Result<Vec<u8>> {
        let input = HmacInput {
            id: &self.id,
            sender: &self.sender,
            content: &self.content,
            iv: &self.iv,
            tag: &self.tag,
            timestamp: self.timestamp,
        };
        serde_json::to_vec(&input).map_err(|e| LanChatError::DecodeError {
            reason: format!("cannot serialize HMAC input: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Events a connected client may send after authenticating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    deny_unknown_fields
)]
pub enum ClientEvent {
    /// Publish this client's ephemeral public key.
    KeyExchange { public_key: String },
    /// The client has derived its keys.
    EncryptionReady,
    /// Relay an encrypted message to every other peer.
    SendMessage(ChatMessage),
    /// Typing indicator.
    Typing {
        #[serde(default)]
        is_typing: bool,
    },
    /// Ask for the roster.
    GetOnlineUsers,
}

impl ClientEvent {
    /// Decodes one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::DecodeError`] for malformed JSON, unknown
    /// event names, missing or extra fields and wrongly typed values.
    pub fn decode(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| LanChatError::DecodeError {
            reason: format!("invalid client event: {e}"),
        })
    }

    /// Returns the wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::KeyExchange { .. } => "key_exchange",
            Self::EncryptionReady => "encryption_ready",
            Self::SendMessage(_) => "send_message",
            Self::Typing { .. } => "typing",
            Self::GetOnlineUsers => "get_online_users",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Events the relay pushes to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserConnected { username: String, timestamp: f64 },
    UserDisconnected { username: String, timestamp: f64 },
    PeerPublicKey {
        username: String,
        public_key: String,
        timestamp: f64,
    },
    ReceiveMessage(ChatMessage),
    UserTyping { username: String, is_typing: bool },
}

impl ServerEvent {
    /// Encodes the event as one outbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::DecodeError`] if serialization fails
    /// (only possible for non-finite timestamps).
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LanChatError::DecodeError {
            reason: format!("cannot encode server event: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
