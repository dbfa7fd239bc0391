//! Inbound validation: message shape, replay window, nonce uniqueness,
//! usernames, public keys and free-text sanitization.
//!
//! The boolean checks are usable on their own. The relay's
//! `send_message` path goes through [`MessageValidator::validate_message`],
//! which runs them in a fixed order and reports the first failure.

use std::sync::Mutex;
use std::time::Duration;

use lanchat_types::config::AppConfig;
use lanchat_types::{LanChatError, Result};
use serde_json::Value;

use crate::message::{unix_now, ChatMessage};
use crate::nonce::{NonceCache, DEFAULT_NONCE_CACHE_SIZE};

/// Fields a chat message object must carry, no more and no fewer.
const MESSAGE_FIELDS: [&str; 7] = ["id", "sender", "content", "iv", "tag", "timestamp", "hmac"];

/// Accepted public key length range, in base64url characters.
const PUBLIC_KEY_LEN: std::ops::RangeInclusive<usize> = 80..=100;

/// Default accepted clock skew in either direction.
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(30);

/// Default maximum size of a message's `content` field in bytes.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 16 * 1024;

// ---------------------------------------------------------------------------
// MessageValidator
// ---------------------------------------------------------------------------

/// Validator shared by every connection handler.
pub struct MessageValidator {
    replay_window: Duration,
    max_content_length: usize,
    nonces: Mutex<NonceCache>,
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self::new(
            DEFAULT_REPLAY_WINDOW,
            DEFAULT_NONCE_CACHE_SIZE,
            DEFAULT_MAX_CONTENT_LENGTH,
        )
    }
}

impl MessageValidator {
    pub fn new(replay_window: Duration, nonce_capacity: usize, max_content_length: usize) -> Self {
        Self {
            replay_window,
            max_content_length,
            nonces: Mutex::new(NonceCache::new(nonce_capacity)),
        }
    }

    /// Builds a validator from the replay and size settings of `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.replay_window(),
            config.nonce_cache_size,
            config.max_content_length,
        )
    }

    /// Returns `true` if `value` is an object with exactly the seven
    /// message fields: six strings and a numeric `timestamp`.
    pub fn validate_structure(&self, value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        if obj.len() != MESSAGE_FIELDS.len() {
            return false;
        }
        MESSAGE_FIELDS.iter().all(|&field| match obj.get(field) {
            Some(Value::Number(_)) => field == "timestamp",
            Some(Value::String(_)) => field != "timestamp",
            _ => false,
        })
    }

    /// Returns `true` if `timestamp` (Unix seconds) lies within the
    /// replay window of the current time, in either direction.
    pub fn validate_timestamp(&self, timestamp: f64) -> bool {
        (unix_now() - timestamp).abs() <= self.replay_window.as_secs_f64()
    }

    /// Records `id` and returns `true` the first time it is seen;
    /// returns `false` for a replay.
    ///
    /// A poisoned lock fails closed.
    pub fn check_nonce(&self, id: &str) -> bool {
        match self.nonces.lock() {
            Ok(mut cache) => cache.check_and_insert(id).is_ok(),
            Err(_) => {
                tracing::error!("nonce cache lock poisoned");
                false
            }
        }
    }

    /// Returns `true` for 3 to 20 ASCII letters, digits or underscores.
    pub fn validate_username(&self, username: &str) -> bool {
        (3..=20).contains(&username.len())
            && username
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    }

    /// Returns `true` for a base64url string of plausible P-256 point
    /// length. Curve membership is checked later by the peers.
    pub fn validate_public_key(&self, public_key: &str) -> bool {
        PUBLIC_KEY_LEN.contains(&public_key.len())
            && public_key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }

    /// Runs the relay pipeline for one message from `username`:
    /// sender binding, content size, timestamp and finally the nonce.
    ///
    /// The nonce is recorded only once every other check has passed,
    /// so a rejected message does not consume its id.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::ValidationFailure`] naming the failed
    /// check, or [`LanChatError::Internal`] on a poisoned lock.
    pub fn validate_message(&self, message: &ChatMessage, username: &str) -> Result<()> {
        if message.sender != username {
            return Err(LanChatError::ValidationFailure {
                reason: format!("sender {} does not match session user", message.sender),
            });
        }

        if message.content.len() > self.max_content_length {
            return Err(LanChatError::ValidationFailure {
                reason: format!(
                    "content is {} bytes, limit is {}",
                    message.content.len(),
                    self.max_content_length
                ),
            });
        }

        if !self.validate_timestamp(message.timestamp) {
            return Err(LanChatError::ValidationFailure {
                reason: "timestamp outside replay window".into(),
            });
        }

        let mut cache = self.nonces.lock().map_err(|_| LanChatError::Internal {
            reason: "nonce cache lock poisoned".into(),
        })?;
        cache.check_and_insert(&message.id).map_err(|e| {
            tracing::warn!(id = %message.id, sender = %message.sender, "replayed message rejected");
            e
        })
    }

    /// Returns the configured replay window.
    pub fn replay_window(&self) -> Duration {
        self.replay_window
    }
}

// ---------------------------------------------------------------------------
// sanitize
// ---------------------------------------------------------------------------

/// Truncates `value` to `max_len` characters, strips control
/// characters other than `\n`, `\r` and `\t`, and trims surrounding
/// whitespace.
pub fn sanitize(value: &str, max_len: usize) -> String {
    let cleaned: String = value
        .chars()
        .take(max_len)
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    cleaned.trim().to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
