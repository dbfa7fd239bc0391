//! Event handlers the transport calls for each connection.
//!
//! The engine owns no sockets and never decrypts message bodies. It
//! gates entry with the shared secret, tracks sessions, relays public
//! keys and sealed messages, and enforces replay protection on the
//! way through.
//!
//! # Per-event pipeline
//!
//! 1. Resolve the connection to a live session, else
//!    `AuthenticationFailure`.
//! 2. Validate the typed payload (already decoded at the boundary).
//! 3. Update session state and refresh activity.
//! 4. Broadcast to the group, skipping the sender.
//!
//! Every call returns a definite [`Reply`] or a typed error; nothing is
//! dropped silently.

use std::net::IpAddr;
use std::sync::Arc;

use lanchat_protocol::message::{unix_now, ChatMessage, ClientEvent, ServerEvent};
use lanchat_protocol::validation::MessageValidator;
use lanchat_types::{ConnectionId, CryptoFailureKind, CsrfToken, LanChatError, Result, SessionId};
use serde::Serialize;

use crate::auth::AuthGate;
use crate::session::{Session, SessionManager};
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Result of a successful [`ChatEngine::authenticate`].
#[derive(Clone, Debug, Serialize)]
pub struct AuthGranted {
    pub session_id: SessionId,
    pub username: String,
    pub csrf_token: CsrfToken,
}

/// Roster entry returned by `get_online_users`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OnlineUser {
    pub username: String,
    pub encryption_ready: bool,
}

/// Successful outcome of a client event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// `{"success": true}`
    Ack { success: bool },
    /// `{"users": [...]}`
    OnlineUsers { users: Vec<OnlineUser> },
}

impl Reply {
    pub fn ack() -> Self {
        Self::Ack { success: true }
    }
}

/// Wire form of a rejection: `{"success": false, "error": code, "reason": ...}`.
#[derive(Clone, Debug, Serialize)]
pub struct Rejection {
    pub success: bool,
    pub error: &'static str,
    pub reason: String,
}

impl From<&LanChatError> for Rejection {
    fn from(e: &LanChatError) -> Self {
        Self {
            success: false,
            error: e.code(),
            reason: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChatEngine
// ---------------------------------------------------------------------------

/// Handler layer shared by every connection.
pub struct ChatEngine<T: Transport> {
    gate: Arc<AuthGate>,
    sessions: Arc<SessionManager>,
    validator: Arc<MessageValidator>,
    transport: T,
}

impl<T: Transport> ChatEngine<T> {
    pub fn new(
        gate: Arc<AuthGate>,
        sessions: Arc<SessionManager>,
        validator: Arc<MessageValidator>,
        transport: T,
    ) -> Self {
        Self {
            gate,
            sessions,
            validator,
            transport,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Admits `username` on `connection` if `secret` matches the group
    /// secret (or provisions it, for the very first caller).
    ///
    /// On success the connection joins the group and the others are
    /// told about the new user.
    ///
    /// # Errors
    ///
    /// - [`LanChatError::ValidationFailure`] for a malformed username.
    /// - [`LanChatError::AuthenticationFailure`] for a wrong secret or
    ///   a rate-limited source.
    pub fn authenticate(
        &self,
        connection: &ConnectionId,
        source: Option<IpAddr>,
        username: &str,
        secret: &str,
    ) -> Result<AuthGranted> {
        let username = username.trim();
        if !self.validator.validate_username(username) {
            return Err(LanChatError::ValidationFailure {
                reason: "username must be 3-20 letters, digits or underscores".into(),
            });
        }

        if !self.gate.verify_secret(secret, source) {
            tracing::warn!(username, source = ?source, "authentication rejected");
            return Err(LanChatError::AuthenticationFailure {
                reason: "wrong shared secret or too many attempts".into(),
            });
        }

        let session = self.sessions.create(username, Some(connection.clone()))?;
        self.join(connection, &session);

        Ok(AuthGranted {
            session_id: session.session_id,
            username: session.username,
            csrf_token: session.csrf_token,
        })
    }

    /// Attaches a new connection to an existing session, e.g. after a
    /// page reload.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::SessionInvalid`] for unknown or expired
    /// sessions.
    pub fn connect(&self, connection: &ConnectionId, session_id: &SessionId) -> Result<()> {
        if !self.sessions.bind_connection(session_id, connection.clone())? {
            return Err(LanChatError::SessionInvalid {
                reason: "unknown or expired session".into(),
            });
        }
        let session = self.live_session(session_id)?;
        self.join(connection, &session);
        Ok(())
    }

    /// Handles a closed connection. The session is kept so the user can
    /// reconnect until it expires or logs out.
    pub fn disconnect(&self, connection: &ConnectionId) -> Result<()> {
        self.transport.leave_group(connection);
        if let Some(session) = self.sessions.unbind_connection(connection)? {
            tracing::info!(username = %session.username, %connection, "user disconnected");
            self.transport.broadcast(
                None,
                ServerEvent::UserDisconnected {
                    username: session.username,
                    timestamp: unix_now(),
                },
            );
        }
        Ok(())
    }

    /// Ends a session explicitly.
    pub fn logout(&self, session_id: &SessionId) -> Result<()> {
        if let Some(session) = self.sessions.delete(session_id)? {
            if let Some(connection) = &session.connection_id {
                self.transport.leave_group(connection);
            }
            tracing::info!(username = %session.username, "user logged out");
        }
        Ok(())
    }

    /// Dispatches one decoded client event.
    ///
    /// # Errors
    ///
    /// - [`LanChatError::AuthenticationFailure`] if the connection has
    ///   no live session.
    /// - [`LanChatError::ValidationFailure`] for a bad public key, a
    ///   stale or replayed message, or a spoofed sender.
    /// - [`LanChatError::CryptoFailure`] with kind
    ///   [`CryptoFailureKind::NotReady`] for out-of-order key steps.
    pub fn handle(&self, connection: &ConnectionId, event: ClientEvent) -> Result<Reply> {
        let session = self
            .sessions
            .find_by_connection(connection)?
            .ok_or_else(|| LanChatError::AuthenticationFailure {
                reason: "connection is not authenticated".into(),
            })?;

        tracing::debug!(event = event.name(), username = %session.username, "client event");

        match event {
            ClientEvent::KeyExchange { public_key } => {
                self.on_key_exchange(connection, &session, public_key)
            }
            ClientEvent::EncryptionReady => self.on_encryption_ready(&session),
            ClientEvent::SendMessage(message) => {
                self.on_send_message(connection, &session, message)
            }
            ClientEvent::Typing { is_typing } => {
                self.transport.broadcast(
                    Some(connection),
                    ServerEvent::UserTyping {
                        username: session.username,
                        is_typing,
                    },
                );
                Ok(Reply::ack())
            }
            ClientEvent::GetOnlineUsers => {
                let users = self
                    .sessions
                    .list_active()?
                    .into_iter()
                    .map(|s| OnlineUser {
                        username: s.username,
                        encryption_ready: s.encryption_established,
                    })
                    .collect();
                Ok(Reply::OnlineUsers { users })
            }
        }
    }

    /// Decodes a raw frame and dispatches it.
    pub fn handle_frame(&self, connection: &ConnectionId, frame: &str) -> Result<Reply> {
        self.handle(connection, ClientEvent::decode(frame)?)
    }

    // -- handlers -----------------------------------------------------------

    fn on_key_exchange(
        &self,
        connection: &ConnectionId,
        session: &Session,
        public_key: String,
    ) -> Result<Reply> {
        if !self.validator.validate_public_key(&public_key) {
            return Err(LanChatError::ValidationFailure {
                reason: "malformed public key".into(),
            });
        }
        if !self.sessions.set_public_key(&session.session_id, &public_key)? {
            return Err(expired());
        }
        self.sessions.touch(&session.session_id)?;

        tracing::info!(username = %session.username, "public key published");
        self.transport.broadcast(
            Some(connection),
            ServerEvent::PeerPublicKey {
                username: session.username.clone(),
                public_key,
                timestamp: unix_now(),
            },
        );
        Ok(Reply::ack())
    }

    fn on_encryption_ready(&self, session: &Session) -> Result<Reply> {
        if !self.sessions.mark_encryption_established(&session.session_id)? {
            return Err(LanChatError::crypto(
                CryptoFailureKind::NotReady,
                "encryption_ready before key_exchange",
            ));
        }
        self.sessions.touch(&session.session_id)?;
        tracing::info!(username = %session.username, "encryption established");
        Ok(Reply::ack())
    }

    fn on_send_message(
        &self,
        connection: &ConnectionId,
        session: &Session,
        message: ChatMessage,
    ) -> Result<Reply> {
        if !session.encryption_established {
            return Err(LanChatError::crypto(
                CryptoFailureKind::NotReady,
                "encryption not established for this session",
            ));
        }

        self.validator.validate_message(&message, &session.username)?;
        self.sessions.touch(&session.session_id)?;

        self.transport
            .broadcast(Some(connection), ServerEvent::ReceiveMessage(message));
        Ok(Reply::ack())
    }

    // -- helpers ------------------------------------------------------------

    fn live_session(&self, session_id: &SessionId) -> Result<Session> {
        self.sessions.get(session_id)?.ok_or_else(expired)
    }

    fn join(&self, connection: &ConnectionId, session: &Session) {
        self.transport.join_group(connection);
        tracing::info!(username = %session.username, %connection, "user connected");
        self.transport.broadcast(
            Some(connection),
            ServerEvent::UserConnected {
                username: session.username.clone(),
                timestamp: unix_now(),
            },
        );
    }
}

fn expired() -> LanChatError {
    LanChatError::SessionInvalid {
        reason: "session expired".into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
