//! Core shared types for the LanChat secure session engine.
//!
//! This crate defines the identifiers, the unified error type and the
//! configuration shared by every other crate in the workspace. No other
//! crate defines its own error enum: everything converts into
//! [`LanChatError`].

pub mod config;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque, globally unique session identifier (UUID v4 text form).
///
/// Allocated once by the session manager and never mutated afterwards.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Allocates a fresh random session identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = LanChatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parsed = Uuid::parse_str(s).map_err(|_| LanChatError::SessionInvalid {
            reason: "session id is not a valid UUID".into(),
        })?;
        Ok(Self(parsed.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ConnectionId
// ---------------------------------------------------------------------------

/// Opaque identifier the transport assigns to one live connection.
///
/// The engine never interprets its contents; it is only compared for
/// equality when binding and looking up sessions.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wraps a transport-supplied identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// CsrfToken
// ---------------------------------------------------------------------------

/// Per-session anti-CSRF token (base64url of 32 random bytes).
///
/// `Debug` is redacted so the token never ends up in log lines.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Wraps an already generated token string.
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(..)")
    }
}

// ---------------------------------------------------------------------------
// CryptoFailureKind
// ---------------------------------------------------------------------------

/// Sub-classification of [`LanChatError::CryptoFailure`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CryptoFailureKind {
    /// Symmetric key material was not exactly 32 bytes.
    InvalidKeyLength,
    /// A peer public key is not a valid point on the curve.
    InvalidPeerKey,
    /// Key agreement was used out of order.
    NotReady,
    /// AEAD tag or HMAC verification failed.
    AuthenticationFailure,
    /// The underlying primitive reported an unexpected error.
    Internal,
}

impl fmt::Display for CryptoFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidPeerKey => write!(f, "invalid peer key"),
            Self::NotReady => write!(f, "not ready"),
            Self::AuthenticationFailure => write!(f, "authentication failure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

// ---------------------------------------------------------------------------
// LanChatError
// ---------------------------------------------------------------------------

/// Central error type for the LanChat engine.
///
/// Every variant is recoverable at the call boundary and is surfaced to
/// the caller as a structured rejection.
#[derive(Debug, Error)]
pub enum LanChatError {
    /// Bad shared secret, rate-limited source, or unauthenticated request.
    #[error("authentication failure: {reason}")]
    AuthenticationFailure {
        /// Human-readable description of the rejection.
        reason: String,
    },

    /// Unknown, expired or unbound session.
    #[error("invalid session: {reason}")]
    SessionInvalid {
        /// Human-readable description of why the session is unusable.
        reason: String,
    },

    /// Malformed message, stale timestamp, replayed nonce, or malformed key.
    #[error("validation failure: {reason}")]
    ValidationFailure {
        /// Human-readable description of the failed check.
        reason: String,
    },

    /// A cryptographic operation failed.
    #[error("crypto failure ({kind}): {reason}")]
    CryptoFailure {
        /// Which class of crypto failure occurred.
        kind: CryptoFailureKind,
        /// Human-readable description of the failure.
        reason: String,
    },

    /// Malformed base64 or text encoding.
    #[error("decode error: {reason}")]
    DecodeError {
        /// Human-readable description of the decoding problem.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// Internal bookkeeping failure (e.g. a poisoned lock).
    #[error("internal error: {reason}")]
    Internal {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl LanChatError {
    /// Shorthand for a [`LanChatError::CryptoFailure`].
    pub fn crypto(kind: CryptoFailureKind, reason: impl Into<String>) -> Self {
        Self::CryptoFailure {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns the crypto failure kind, if this is a crypto failure.
    pub fn crypto_kind(&self) -> Option<CryptoFailureKind> {
        match self {
            Self::CryptoFailure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Stable machine-readable error code sent back to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::SessionInvalid { .. } => "session_invalid",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::CryptoFailure { .. } => "crypto_failure",
            Self::DecodeError { .. } => "decode_error",
            Self::ConfigError { .. } => "config_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`LanChatError`].
pub type Result<T> = std::result::Result<T, LanChatError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
