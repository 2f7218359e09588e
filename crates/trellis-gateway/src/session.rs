//! Session management
//!
//! Process-wide mapping from session id to open stream transport. The two
//! HTTP interactions (open a stream, submit a command) arrive on unrelated
//! connections, so this map is the only shared mutable state in the core.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::transport::{FrameReceiver, StreamTransport};

/// A live session: one open stream plus its correlation id.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session id, minted by the transport.
    pub id: String,
    /// The transport pushing frames to this session's client.
    pub transport: Arc<StreamTransport>,
    /// Creation time, for diagnostics only.
    pub created_at: DateTime<Utc>,
}

/// Concurrency-safe registry of live sessions.
///
/// Invariant: the registry holds exactly the transports whose close
/// notification has not yet fired. Each transport removes its own entry on
/// close, so lookups against a closed session fail fast.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Create a transport, register it, and wire its close notification to
    /// remove the entry. The returned receiver feeds the response stream.
    pub fn create(&self) -> (Session, FrameReceiver) {
        let (transport, rx) = StreamTransport::open();
        let session = Session {
            id: transport.session_id().to_string(),
            transport: Arc::clone(&transport),
            created_at: Utc::now(),
        };

        // The notification only removes the entry; it never calls back into
        // the transport, which keeps the close idempotence trivial.
        let sessions = Arc::clone(&self.sessions);
        let id = session.id.clone();
        transport.on_close(move || {
            sessions.remove(&id);
            debug!(session_id = %id, "session removed on close");
        });

        self.sessions.insert(session.id.clone(), session.clone());
        (session, rx)
    }

    /// Look up the transport for a live session.
    pub fn lookup(&self, id: &str) -> Option<Arc<StreamTransport>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(&entry.transport))
    }

    /// Remove a session entry. Idempotent; closing the transport itself is
    /// the transport's own business, not this method's.
    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every live transport. Used at shutdown; individual close
    /// failures are logged and do not stop the remaining closures.
    pub fn close_all(&self) {
        let sessions: Vec<Session> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for session in sessions {
            info!(session_id = %session.id, "closing transport");
            if let Err(e) = session.transport.close() {
                warn!(session_id = %session.id, "error closing transport: {}", e);
            }
        }
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StreamFrame;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_create_then_lookup_returns_same_transport() {
        let registry = SessionRegistry::new();
        let (session, _rx) = registry.create();

        let found = registry.lookup(&session.id).unwrap();
        assert!(Arc::ptr_eq(&found, &session.transport));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_after_close_returns_none() {
        let registry = SessionRegistry::new();
        let (session, _rx) = registry.create();

        session.transport.close().unwrap();

        assert!(registry.lookup(&session.id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let (session, _rx) = registry.create();

        registry.remove(&session.id);
        registry.remove(&session.id);
        registry.remove("never-issued");

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_size_tracks_unclosed_transports() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = registry.create();
        let (_second, _rx2) = registry.create();
        assert_eq!(registry.len(), 2);

        first.transport.close().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_close_all_closes_every_transport_and_terminates_streams() {
        let registry = SessionRegistry::new();
        let mut sessions = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (session, rx) = registry.create();
            sessions.push(session);
            receivers.push(rx);
        }

        registry.close_all();

        // Each transport must have been closed individually, not merely
        // dropped from the map by the trailing clear().
        for session in &sessions {
            assert!(session.transport.is_closed());
        }
        assert!(registry.is_empty());
        for mut rx in receivers {
            assert_eq!(rx.recv().await, Some(StreamFrame::Shutdown));
        }
    }

    #[tokio::test]
    async fn test_close_all_isolates_per_entry_failures() {
        let registry = SessionRegistry::new();
        let (_broken, broken_rx) = registry.create();
        let (_healthy, mut healthy_rx) = registry.create();

        // A dropped receiver makes the terminator undeliverable for one
        // entry; the other must still close cleanly.
        drop(broken_rx);
        registry.close_all();

        assert!(registry.is_empty());
        assert_eq!(healthy_rx.recv().await, Some(StreamFrame::Shutdown));
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let registry = SessionRegistry::new();
        let mut seen = HashSet::new();
        let mut receivers = Vec::new();

        for _ in 0..10_000 {
            let (session, rx) = registry.create();
            assert!(seen.insert(session.id), "duplicate session id minted");
            receivers.push(rx);
        }
        assert_eq!(registry.len(), 10_000);
    }
}
