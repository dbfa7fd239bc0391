//! Seam between the engine and whatever carries frames to browsers.
//!
//! The engine never owns sockets. It asks its [`Transport`] to add or
//! remove a connection from the chat group and to fan an event out to
//! the group, optionally skipping the originating connection.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use lanchat_protocol::message::ServerEvent;
use lanchat_types::ConnectionId;

/// Group membership and fan-out provided by the hosting server.
///
/// Implementations must be cheap and non-blocking: the engine calls
/// them while handling a client event.
pub trait Transport: Send + Sync {
    /// Adds `connection` to the chat group.
    fn join_group(&self, connection: &ConnectionId);

    /// Removes `connection` from the chat group.
    fn leave_group(&self, connection: &ConnectionId);

    /// Sends `event` to every group member except `except`.
    fn broadcast(&self, except: Option<&ConnectionId>, event: ServerEvent);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn join_group(&self, connection: &ConnectionId) {
        (**self).join_group(connection)
    }

    fn leave_group(&self, connection: &ConnectionId) {
        (**self).leave_group(connection)
    }

    fn broadcast(&self, except: Option<&ConnectionId>, event: ServerEvent) {
        (**self).broadcast(except, event)
    }
}

// ---------------------------------------------------------------------------
// LoggingTransport
// ---------------------------------------------------------------------------

/// Transport that only logs. Used by the daemon when no socket server
/// is attached.
#[derive(Debug, Default)]
pub struct LoggingTransport;

impl Transport for LoggingTransport {
    fn join_group(&self, connection: &ConnectionId) {
        tracing::debug!(%connection, "join group");
    }

    fn leave_group(&self, connection: &ConnectionId) {
        tracing::debug!(%connection, "leave group");
    }

    fn broadcast(&self, except: Option<&ConnectionId>, event: ServerEvent) {
        match event.encode() {
            Ok(frame) => tracing::debug!(except = ?except, frame = %frame, "broadcast"),
            Err(e) => tracing::warn!(error = %e, "unencodable broadcast dropped"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

/// One fan-out as seen by [`RecordingTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    /// Members the event reached, in sorted order.
    pub recipients: Vec<ConnectionId>,
    pub event: ServerEvent,
}

/// In-memory transport that tracks membership and records every
/// broadcast. Suitable for embedding tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    members: Mutex<BTreeSet<String>>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current group members, sorted.
    pub fn members(&self) -> Vec<ConnectionId> {
        self.members
            .lock()
            .map(|m| m.iter().map(|c| ConnectionId::new(c.as_str())).collect())
            .unwrap_or_default()
    }

    /// Every delivery recorded so far.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Events that reached `connection`, oldest first.
    pub fn received_by(&self, connection: &ConnectionId) -> Vec<ServerEvent> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.recipients.contains(connection))
            .map(|d| d.event)
            .collect()
    }

    /// Forgets recorded deliveries, keeping membership.
    pub fn clear_deliveries(&self) {
        if let Ok(mut d) = self.deliveries.lock() {
            d.clear();
        }
    }
}

impl Transport for RecordingTransport {
    fn join_group(&self, connection: &ConnectionId) {
        if let Ok(mut m) = self.members.lock() {
            m.insert(connection.as_str().to_owned());
        }
    }

    fn leave_group(&self, connection: &ConnectionId) {
        if let Ok(mut m) = self.members.lock() {
            m.remove(connection.as_str());
        }
    }

    fn broadcast(&self, except: Option<&ConnectionId>, event: ServerEvent) {
        let recipients = self
            .members()
            .into_iter()
            .filter(|c| Some(c) != except)
            .collect();
        if let Ok(mut d) = self.deliveries.lock() {
            d.push(Delivery { recipients, event });
        }
    }
}
