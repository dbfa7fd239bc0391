//! Periodic maintenance tasks.
//!
//! Called by the daemon on a configurable interval (default: 60 s).
//! All operations are **idempotent**: running them more often than
//! needed has no adverse effects.
//!
//! # Tasks
//!
//! 1. **Session expiry sweep**: drop sessions idle past the timeout so
//!    the table does not grow with users who closed the tab.
//! 2. **Attempt log pruning**: forget authentication attempts that
//!    have left the rate-limit window.
//!
//! # Nonce cache
//!
//! The nonce replay cache is a bounded FIFO. Old entries are evicted
//! when capacity is reached, so no explicit cleanup is required.

use lanchat_types::Result;

use crate::auth::AuthGate;
use crate::session::SessionManager;

// ---------------------------------------------------------------------------
// MaintenanceReport
// ---------------------------------------------------------------------------

/// Summary of a maintenance run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Number of expired sessions removed.
    pub sessions_expired: usize,
    /// Number of source addresses whose attempt windows emptied.
    pub sources_pruned: usize,
}

// ---------------------------------------------------------------------------
// Maintenance entry point
// ---------------------------------------------------------------------------

/// Runs every maintenance task once.
///
/// # Errors
///
/// Returns [`lanchat_types::LanChatError::Internal`] if a lock is
/// poisoned. The session sweep runs first; a failure there skips the
/// attempt log.
pub fn run_maintenance(sessions: &SessionManager, gate: &AuthGate) -> Result<MaintenanceReport> {
    let report = MaintenanceReport {
        sessions_expired: sessions.prune_expired()?,
        sources_pruned: gate.prune_expired()?,
    };

    tracing::debug!(
        sessions_expired = report.sessions_expired,
        sources_pruned = report.sources_pruned,
        active_sessions = sessions.len(),
        "maintenance completed"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lanchat_types::LanChatError;
    use std::net::{IpAddr, Ipv4Addr};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn idle_run_reports_nothing() -> std::result::Result<(), LanChatError> {
        let report = run_maintenance(&SessionManager::default(), &AuthGate::default())?;
        assert_eq!(report, MaintenanceReport::default());
        Ok(())
    }

    #[test]
    fn sweeps_sessions_and_attempts() -> std::result::Result<(), LanChatError> {
        let sessions = SessionManager::new(Duration::from_millis(40));
        let gate = AuthGate::new(5, Duration::from_millis(40));
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        sessions.create("alice_01", None)?;
        gate.verify_secret("swordfish", None);
        gate.verify_secret("wrong", Some(ip));

        thread::sleep(Duration::from_millis(70));
        let report = run_maintenance(&sessions, &gate)?;
        assert_eq!(report.sessions_expired, 1);
        assert_eq!(report.sources_pruned, 1);

        // Second run is a no-op.
        assert_eq!(run_maintenance(&sessions, &gate)?, MaintenanceReport::default());
        Ok(())
    }
}
