//! Engine configuration with sensible defaults.
//!
//! All operational parameters are centralized here. Every value has a
//! documented default suitable for a LAN deployment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LanChatError, Result};

/// Global engine configuration.
///
/// Loaded from a JSON file by the daemon; every field falls back to its
/// default when omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Idle time after which a session expires, in seconds.
    pub session_timeout_secs: u64,

    /// Maximum allowed distance between a message timestamp and the
    /// relay clock, in seconds (applies to past and future alike).
    pub replay_window_secs: u64,

    /// Number of recent message ids kept for replay detection.
    pub nonce_cache_size: usize,

    /// Authentication attempts allowed per source address per window.
    pub max_login_attempts: usize,

    /// Length of the rolling authentication rate-limit window, in seconds.
    pub login_window_secs: u64,

    /// Maximum length of an encrypted message body, in bytes.
    pub max_content_length: usize,

    /// Interval between expiry sweeps run by the daemon, in seconds.
    pub maintenance_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 1800, // 30 minutes
            replay_window_secs: 30,
            nonce_cache_size: 1000,
            max_login_attempts: 5,
            login_window_secs: 300, // 5 minutes
            max_content_length: 16 * 1024,
            maintenance_interval_secs: 60,
        }
    }
}

impl AppConfig {
    /// Validates all configuration values.
    ///
    /// Returns an error if any value is outside its acceptable range.
    pub fn validate(&self) -> Result<()> {
        if self.session_timeout_secs == 0 {
            return Err(LanChatError::ConfigError {
                reason: "session_timeout_secs must be greater than 0".into(),
            });
        }

        if self.replay_window_secs == 0 {
            return Err(LanChatError::ConfigError {
                reason: "replay_window_secs must be greater than 0".into(),
            });
        }

        if self.nonce_cache_size == 0 {
            return Err(LanChatError::ConfigError {
                reason: "nonce_cache_size must be greater than 0".into(),
            });
        }

        if self.max_login_attempts == 0 {
            return Err(LanChatError::ConfigError {
                reason: "max_login_attempts must be greater than 0".into(),
            });
        }

        if self.login_window_secs == 0 {
            return Err(LanChatError::ConfigError {
                reason: "login_window_secs must be greater than 0".into(),
            });
        }

        if self.max_content_length == 0 {
            return Err(LanChatError::ConfigError {
                reason: "max_content_length must be greater than 0".into(),
            });
        }

        if self.maintenance_interval_secs == 0 {
            return Err(LanChatError::ConfigError {
                reason: "maintenance_interval_secs must be greater than 0".into(),
            });
        }

        Ok(())
    }

    /// Session idle timeout as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Replay window as a [`Duration`].
    pub fn replay_window(&self) -> Duration {
        Duration::from_secs(self.replay_window_secs)
    }

    /// Authentication rate-limit window as a [`Duration`].
    pub fn login_window(&self) -> Duration {
        Duration::from_secs(self.login_window_secs)
    }

    /// Maintenance interval as a [`Duration`].
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}
