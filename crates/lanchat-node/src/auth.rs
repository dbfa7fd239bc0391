//! Shared-secret authentication with per-source attempt throttling.
//!
//! The group secret is provisioned by the first successful call to
//! [`AuthGate::verify_secret`] (first connector wins). Afterwards every
//! candidate is checked against the stored PBKDF2 hash in constant time.
//!
//! Each source address gets an independent rolling window of attempt
//! timestamps. Entries older than the window are pruned before every
//! rate check, so the log never holds stale attempts. The `*_at`
//! variants take the current instant explicitly; the plain methods use
//! `Instant::now()`.
//!
//! Thread-safe via `std::sync::Mutex`.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lanchat_crypto::kdf::{pbkdf2_hash, verify_password, PasswordHash};
use lanchat_types::config::AppConfig;
use lanchat_types::{LanChatError, Result};

/// Default number of attempts allowed per source within the window.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default rolling window length.
pub const DEFAULT_ATTEMPT_WINDOW: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// AttemptLog
// ---------------------------------------------------------------------------

/// Rolling-window attempt counter keyed by source address.
pub struct AttemptLog {
    entries: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
    max_attempts: usize,
    window: Duration,
}

impl AttemptLog {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_attempts,
            window,
        }
    }

    /// Returns `true` if `source` may make another attempt now.
    ///
    /// Prunes that source's expired entries first. Does not record.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::Internal`] if the lock is poisoned.
    pub fn is_allowed(&self, source: IpAddr) -> Result<bool> {
        self.is_allowed_at(source, Instant::now())
    }

    /// [`is_allowed`](Self::is_allowed) evaluated at `now`.
    pub fn is_allowed_at(&self, source: IpAddr, now: Instant) -> Result<bool> {
        let mut map = self.lock()?;
        let allowed = match map.get_mut(&source) {
            Some(times) => {
                prune_window(times, now, self.window);
                times.len() < self.max_attempts
            }
            None => true,
        };
        if map.get(&source).is_some_and(VecDeque::is_empty) {
            map.remove(&source);
        }
        Ok(allowed)
    }

    /// Records one attempt from `source` at the current instant.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::Internal`] if the lock is poisoned.
    pub fn record(&self, source: IpAddr) -> Result<()> {
        self.record_at(source, Instant::now())
    }

    /// Records one attempt from `source` at `at`. Instants must not go
    /// backwards per source.
    pub fn record_at(&self, source: IpAddr, at: Instant) -> Result<()> {
        let mut map = self.lock()?;
        map.entry(source).or_default().push_back(at);
        Ok(())
    }

    /// Number of attempts currently counted against `source`.
    pub fn attempts(&self, source: IpAddr) -> usize {
        self.attempts_at(source, Instant::now())
    }

    /// Number of attempts counted against `source` as of `now`.
    pub fn attempts_at(&self, source: IpAddr, now: Instant) -> usize {
        self.lock()
            .map(|mut map| match map.get_mut(&source) {
                Some(times) => {
                    prune_window(times, now, self.window);
                    times.len()
                }
                None => 0,
            })
            .unwrap_or(0)
    }

    /// Drops expired entries for every source and forgets sources with
    /// no remaining attempts. Returns the number of sources removed.
    pub fn prune_expired(&self) -> Result<usize> {
        self.prune_expired_at(Instant::now())
    }

    /// [`prune_expired`](Self::prune_expired) evaluated at `now`.
    pub fn prune_expired_at(&self, now: Instant) -> Result<usize> {
        let mut map = self.lock()?;
        let before = map.len();
        map.retain(|_, times| {
            prune_window(times, now, self.window);
            !times.is_empty()
        });
        Ok(before - map.len())
    }

    /// Returns the number of sources with at least one attempt on file.
    pub fn tracked_sources(&self) -> usize {
        self.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Forgets every source.
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<IpAddr, VecDeque<Instant>>>> {
        self.entries.lock().map_err(|_| LanChatError::Internal {
            reason: "attempt log lock poisoned".into(),
        })
    }
}

/// Pops timestamps that have left the window. Timestamps are pushed in
/// order, so the oldest is always at the front.
fn prune_window(times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = times.front() {
        if now.duration_since(oldest) >= window {
            times.pop_front();
        } else {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// AuthGate
// ---------------------------------------------------------------------------

/// Gate holding the group secret and the attempt log.
///
/// Constructed once by the process entry point and shared by `Arc`.
pub struct AuthGate {
    secret: Mutex<Option<PasswordHash>>,
    attempts: AttemptLog,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_ATTEMPT_WINDOW)
    }
}

impl AuthGate {
    /// Creates an unprovisioned gate.
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            secret: Mutex::new(None),
            attempts: AttemptLog::new(max_attempts, window),
        }
    }

    /// Creates an unprovisioned gate with the rate-limit settings of
    /// `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.max_login_attempts, config.login_window())
    }

    /// Checks `candidate` against the group secret.
    ///
    /// 1. With a `source`, a source over its attempt budget is refused
    ///    without looking at the candidate.
    /// 2. If no secret is set yet, `candidate` becomes the secret and
    ///    the call succeeds. Check and set happen under one lock, so
    ///    concurrent first callers cannot both provision.
    /// 3. Otherwise the candidate is verified in constant time and the
    ///    attempt is recorded against `source`, whatever the outcome.
    ///
    /// Internal failures (poisoned locks) are logged and reported as a
    /// rejection.
    pub fn verify_secret(&self, candidate: &str, source: Option<IpAddr>) -> bool {
        self.verify_secret_at(candidate, source, Instant::now())
    }

    /// [`verify_secret`](Self::verify_secret) with the rate limit
    /// evaluated, and the attempt recorded, at `now`.
    pub fn verify_secret_at(&self, candidate: &str, source: Option<IpAddr>, now: Instant) -> bool {
        match self.try_verify_secret(candidate, source, now) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "secret verification aborted");
                false
            }
        }
    }

    fn try_verify_secret(
        &self,
        candidate: &str,
        source: Option<IpAddr>,
        now: Instant,
    ) -> Result<bool> {
        if let Some(ip) = source {
            if !self.attempts.is_allowed_at(ip, now)? {
                tracing::warn!(source = %ip, "authentication rate limit exceeded");
                return Ok(false);
            }
        }

        let stored = {
            let mut secret = self.secret.lock().map_err(|_| LanChatError::Internal {
                reason: "secret lock poisoned".into(),
            })?;
            match secret.as_ref() {
                Some(hash) => hash.clone(),
                None => {
                    *secret = Some(pbkdf2_hash(candidate, None));
                    tracing::info!(source = ?source, "group secret provisioned by first connector");
                    return Ok(true);
                }
            }
        };

        let accepted = verify_password(candidate, &stored);
        if let Some(ip) = source {
            self.attempts.record_at(ip, now)?;
        }
        if !accepted {
            tracing::warn!(source = ?source, "shared secret rejected");
        }
        Ok(accepted)
    }

    /// Returns `true` once a secret has been provisioned.
    pub fn is_bootstrapped(&self) -> bool {
        self.secret.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Clears the secret and every attempt window.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::Internal`] if a lock is poisoned.
    pub fn reset(&self) -> Result<()> {
        *self.secret.lock().map_err(|_| LanChatError::Internal {
            reason: "secret lock poisoned".into(),
        })? = None;
        self.attempts.clear()?;
        tracing::info!("auth gate reset");
        Ok(())
    }

    /// Drops attempt entries that have left the window.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::Internal`] if the lock is poisoned.
    pub fn prune_expired(&self) -> Result<usize> {
        self.attempts.prune_expired()
    }

    /// [`prune_expired`](Self::prune_expired) evaluated at `now`.
    pub fn prune_expired_at(&self, now: Instant) -> Result<usize> {
        self.attempts.prune_expired_at(now)
    }

    /// Returns the number of sources with attempts on file.
    pub fn tracked_sources(&self) -> usize {
        self.attempts.tracked_sources()
    }

    /// Returns the number of attempts counted against `source`.
    pub fn attempts(&self, source: IpAddr) -> usize {
        self.attempts.attempts(source)
    }

    /// Returns the number of attempts counted against `source` as of
    /// `now`.
    pub fn attempts_at(&self, source: IpAddr, now: Instant) -> usize {
        self.attempts.attempts_at(source, now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
