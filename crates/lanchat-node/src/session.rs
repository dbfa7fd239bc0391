//! In-memory session table.
//!
//! One [`Session`] per authenticated participant, keyed by
//! [`SessionId`]. Sessions expire after a period of inactivity; an
//! expired session is removed the next time it is looked up or during
//! a sweep. Reads return owned snapshots so no lock is held by callers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lanchat_crypto::encoding::b64url_encode;
use lanchat_crypto::random::random_array;
use lanchat_types::config::AppConfig;
use lanchat_types::{ConnectionId, CsrfToken, LanChatError, Result, SessionId};
use subtle::ConstantTimeEq;

/// Default idle timeout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(1800);

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One authenticated participant.
#[derive(Clone, Debug)]
pub struct Session {
    pub session_id: SessionId,
    pub username: String,
    /// Transport connection currently bound, if any.
    pub connection_id: Option<ConnectionId>,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
    /// Monotonic, never moves backwards.
    pub last_activity: Instant,
    pub csrf_token: CsrfToken,
    /// Peer's advertised ECDH public key (base64url).
    pub public_key: Option<String>,
    pub encryption_established: bool,
}

impl Session {
    fn new(username: &str, connection: Option<ConnectionId>) -> Self {
        let connected = connection.is_some();
        Self {
            session_id: SessionId::generate(),
            username: username.to_owned(),
            connection_id: connection,
            connected,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            csrf_token: CsrfToken::new(b64url_encode(&random_array::<32>())),
            public_key: None,
            encryption_established: false,
        }
    }

    /// Returns `true` once the session has been idle for longer than
    /// `timeout`.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Mutex-guarded session table.
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Session>>,
    timeout: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT)
    }
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.session_timeout())
    }

    /// Allocates and stores a new session for `username`.
    ///
    /// A connection belongs to at most one session: if `connection` is
    /// already bound elsewhere it is released from that session first.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::Internal`] if the lock is poisoned.
    pub fn create(&self, username: &str, connection: Option<ConnectionId>) -> Result<Session> {
        let session = Session::new(username, connection);
        let mut map = self.lock()?;
        if let Some(conn) = &session.connection_id {
            release_connection(&mut map, conn, &session.session_id);
        }
        map.insert(session.session_id.clone(), session.clone());
        drop(map);
        tracing::info!(session = %session.session_id, username, "session created");
        Ok(session)
    }

    /// Returns a snapshot of the session, or `None` if it is unknown or
    /// expired. Expired sessions are removed.
    pub fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        let mut map = self.lock()?;
        match map.get(id) {
            Some(s) if s.is_expired(self.timeout) => {
                map.remove(id);
                tracing::info!(session = %id, "session expired");
                Ok(None)
            }
            Some(s) => Ok(Some(s.clone())),
            None => Ok(None),
        }
    }

    /// Refreshes the activity time. No-op for unknown sessions.
    pub fn touch(&self, id: &SessionId) -> Result<()> {
        self.with_live(id, |s| s.last_activity = Instant::now())?;
        Ok(())
    }

    /// Records the session's public key. Returns `false` if the session
    /// is unknown or expired.
    ///
    /// A new key invalidates any earlier encryption-ready flag.
    pub fn set_public_key(&self, id: &SessionId, public_key: &str) -> Result<bool> {
        Ok(self
            .with_live(id, |s| {
                s.public_key = Some(public_key.to_owned());
                s.encryption_established = false;
            })?
            .is_some())
    }

    /// Marks the session encryption-ready.
    ///
    /// Returns `false` if the session is unknown, expired, or has not
    /// published a public key yet.
    pub fn mark_encryption_established(&self, id: &SessionId) -> Result<bool> {
        Ok(self
            .with_live(id, |s| {
                if s.public_key.is_some() {
                    s.encryption_established = true;
                }
                s.encryption_established
            })?
            .unwrap_or(false))
    }

    /// Removes the session unconditionally and returns it if present.
    pub fn delete(&self, id: &SessionId) -> Result<Option<Session>> {
        let removed = self.lock()?.remove(id);
        if removed.is_some() {
            tracing::info!(session = %id, "session deleted");
        }
        Ok(removed)
    }

    /// Prunes expired sessions and returns snapshots of the rest.
    pub fn list_active(&self) -> Result<Vec<Session>> {
        let mut map = self.lock()?;
        self.prune_locked(&mut map);
        Ok(map.values().cloned().collect())
    }

    /// Finds the live session bound to `connection` (linear scan).
    pub fn find_by_connection(&self, connection: &ConnectionId) -> Result<Option<Session>> {
        let map = self.lock()?;
        Ok(map
            .values()
            .find(|s| {
                s.connection_id.as_ref() == Some(connection) && !s.is_expired(self.timeout)
            })
            .cloned())
    }

    /// Binds `connection` to the session (page reload or first socket)
    /// and marks it connected. Returns `false` for unknown or expired
    /// sessions.
    ///
    /// Any other session holding `connection` loses it, so a connection
    /// never resolves to two users.
    pub fn bind_connection(&self, id: &SessionId, connection: ConnectionId) -> Result<bool> {
        let mut map = self.lock()?;
        match map.get(id) {
            None => return Ok(false),
            Some(s) if s.is_expired(self.timeout) => {
                map.remove(id);
                tracing::info!(session = %id, "session expired");
                return Ok(false);
            }
            Some(_) => {}
        }

        release_connection(&mut map, &connection, id);
        if let Some(s) = map.get_mut(id) {
            s.connection_id = Some(connection);
            s.connected = true;
            s.last_activity = Instant::now();
        }
        Ok(true)
    }

    /// Detaches `connection` from the session holding it and returns
    /// that session's updated snapshot. The session survives so the
    /// user can reconnect.
    ///
    /// An expired holder is removed instead and `None` is returned.
    pub fn unbind_connection(&self, connection: &ConnectionId) -> Result<Option<Session>> {
        let mut map = self.lock()?;
        let Some(id) = map
            .iter()
            .find(|(_, s)| s.connection_id.as_ref() == Some(connection))
            .map(|(id, _)| id.clone())
        else {
            return Ok(None);
        };

        let expired = map.get(&id).map_or(true, |s| s.is_expired(self.timeout));
        if expired {
            map.remove(&id);
            tracing::info!(session = %id, "session expired");
            return Ok(None);
        }

        Ok(map.get_mut(&id).map(|s| {
            s.connection_id = None;
            s.connected = false;
            s.clone()
        }))
    }

    /// Compares `token` with the session's CSRF token in constant time.
    /// Unknown or expired sessions never match.
    pub fn verify_csrf(&self, id: &SessionId, token: &str) -> bool {
        match self.get(id) {
            Ok(Some(s)) => s.csrf_token.as_str().as_bytes().ct_eq(token.as_bytes()).into(),
            _ => false,
        }
    }

    /// Removes every expired session and returns how many were removed.
    pub fn prune_expired(&self) -> Result<usize> {
        let mut map = self.lock()?;
        Ok(self.prune_locked(&mut map))
    }

    /// Number of stored sessions, expired ones included until pruned.
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured idle timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // -- internals ----------------------------------------------------------

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions.lock().map_err(|_| LanChatError::Internal {
            reason: "session table lock poisoned".into(),
        })
    }

    /// Runs `f` on the live session `id`. Expired sessions are removed
    /// and treated as absent.
    fn with_live<T>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> T) -> Result<Option<T>> {
        let mut map = self.lock()?;
        let expired = match map.get_mut(id) {
            Some(s) if !s.is_expired(self.timeout) => return Ok(Some(f(s))),
            Some(_) => true,
            None => false,
        };
        if expired {
            map.remove(id);
            tracing::info!(session = %id, "session expired");
        }
        Ok(None)
    }

    fn prune_locked(&self, map: &mut HashMap<SessionId, Session>) -> usize {
        let before = map.len();
        map.retain(|_, s| !s.is_expired(self.timeout));
        let removed = before - map.len();
        if removed > 0 {
            tracing::info!(removed, "expired sessions pruned");
        }
        removed
    }
}

/// Clears `connection` from every session other than `keep`.
fn release_connection(
    map: &mut HashMap<SessionId, Session>,
    connection: &ConnectionId,
    keep: &SessionId,
) {
    for (id, s) in map.iter_mut() {
        if id != keep && s.connection_id.as_ref() == Some(connection) {
            s.connection_id = None;
            s.connected = false;
            tracing::info!(session = %id, %connection, "connection moved to another session");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
