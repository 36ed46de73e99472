//! Broadcast fan-out for connected sessions
//!
//! The hub owns the per-lobby subscriber sets, deliberately decoupled from
//! the lobby entities themselves: the registry emits events through the
//! `Broadcaster` trait and never touches transport state. A recording
//! implementation is provided for tests.

use crate::error::{LobbyError, Result};
use crate::gateway::events::OutboundEvent;
use crate::types::{LobbyCode, SessionId};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

/// Trait for delivering outbound events to sessions.
///
/// Deliveries are synchronous: production fan-out pushes onto unbounded
/// per-session channels and never blocks, so lobby operations stay atomic
/// from mutation through broadcast.
pub trait Broadcaster: Send + Sync {
    /// Deliver an event to a single session
    fn send_to(&self, session_id: &str, event: OutboundEvent);

    /// Deliver an event to every session joined to a lobby code
    fn broadcast(&self, code: &str, event: OutboundEvent);

    /// Drop the subscriber set of a disposed lobby
    fn close_lobby(&self, code: &str);
}

#[derive(Default)]
struct HubInner {
    /// Outbound channel per connected session
    sessions: HashMap<SessionId, mpsc::UnboundedSender<OutboundEvent>>,
    /// Sessions currently joined to each lobby code
    lobbies: HashMap<LobbyCode, HashSet<SessionId>>,
}

/// Session hub backing the production gateway.
///
/// Each WebSocket connection registers an unbounded sender at upgrade time
/// and is attached to a lobby's subscriber set when it joins one.
#[derive(Default)]
pub struct SessionHub {
    inner: RwLock<HubInner>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected session's outbound channel
    pub fn register_session(
        &self,
        session_id: &str,
        sender: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.sessions.insert(session_id.to_string(), sender);
        Ok(())
    }

    /// Forget a session entirely (called when its socket closes)
    pub fn unregister_session(&self, session_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.sessions.remove(session_id);
        for subscribers in inner.lobbies.values_mut() {
            subscribers.remove(session_id);
        }
        Ok(())
    }

    /// Attach a session to a lobby's subscriber set
    pub fn join_lobby(&self, code: &str, session_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .lobbies
            .entry(code.to_string())
            .or_default()
            .insert(session_id.to_string());
        Ok(())
    }

    /// Detach a session from a lobby's subscriber set
    pub fn leave_lobby(&self, code: &str, session_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(subscribers) = inner.lobbies.get_mut(code) {
            subscribers.remove(session_id);
            if subscribers.is_empty() {
                inner.lobbies.remove(code);
            }
        }
        Ok(())
    }

    /// Number of currently registered sessions
    pub fn session_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.sessions.len())
            .unwrap_or(0)
    }

    /// Number of sessions currently subscribed to a code
    pub fn subscriber_count(&self, code: &str) -> usize {
        self.inner
            .read()
            .map(|inner| inner.lobbies.get(code).map_or(0, |s| s.len()))
            .unwrap_or(0)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HubInner>> {
        self.inner.write().map_err(|_| {
            LobbyError::InternalError {
                message: "Failed to acquire hub lock".to_string(),
            }
            .into()
        })
    }

    fn sender_for(&self, session_id: &str) -> Option<mpsc::UnboundedSender<OutboundEvent>> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.sessions.get(session_id).cloned())
    }

    fn senders_for_lobby(&self, code: &str) -> Vec<mpsc::UnboundedSender<OutboundEvent>> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let Some(subscribers) = inner.lobbies.get(code) else {
            return Vec::new();
        };
        subscribers
            .iter()
            .filter_map(|session_id| inner.sessions.get(session_id).cloned())
            .collect()
    }
}

impl Broadcaster for SessionHub {
    fn send_to(&self, session_id: &str, event: OutboundEvent) {
        if let Some(sender) = self.sender_for(session_id) {
            // A closed channel means the socket is already going away.
            if sender.send(event).is_err() {
                debug!("Dropped outbound event for closed session {session_id}");
            }
        }
    }

    fn broadcast(&self, code: &str, event: OutboundEvent) {
        for sender in self.senders_for_lobby(code) {
            let _ = sender.send(event.clone());
        }
    }

    fn close_lobby(&self, code: &str) {
        if let Ok(mut inner) = self.write() {
            inner.lobbies.remove(code);
        }
    }
}

/// Where a recorded event was addressed
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedTarget {
    Session(SessionId),
    Lobby(LobbyCode),
}

/// Recording broadcaster for tests: captures every delivery in order
/// instead of pushing it onto a transport.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    events: std::sync::Mutex<Vec<(RecordedTarget, OutboundEvent)>>,
    closed: std::sync::Mutex<Vec<LobbyCode>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded deliveries in order
    pub fn events(&self) -> Vec<(RecordedTarget, OutboundEvent)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events broadcast to a lobby code
    pub fn broadcasts_to(&self, code: &str) -> Vec<OutboundEvent> {
        self.events()
            .into_iter()
            .filter_map(|(target, event)| match target {
                RecordedTarget::Lobby(c) if c == code => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Events sent directly to a session
    pub fn sent_to(&self, session_id: &str) -> Vec<OutboundEvent> {
        self.events()
            .into_iter()
            .filter_map(|(target, event)| match target {
                RecordedTarget::Session(s) if s == session_id => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Count deliveries of a given event name across all targets
    pub fn count_events_of_type(&self, name: &str) -> usize {
        self.events()
            .iter()
            .filter(|(_, event)| event.name() == name)
            .count()
    }

    /// Lobby codes whose subscriber sets were closed
    pub fn closed_lobbies(&self) -> Vec<LobbyCode> {
        self.closed.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Clear recorded deliveries
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn send_to(&self, session_id: &str, event: OutboundEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((RecordedTarget::Session(session_id.to_string()), event));
        }
    }

    fn broadcast(&self, code: &str, event: OutboundEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((RecordedTarget::Lobby(code.to_string()), event));
        }
    }

    fn close_lobby(&self, code: &str) {
        if let Ok(mut closed) = self.closed.lock() {
            closed.push(code.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_registered_session() {
        let hub = SessionHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register_session("s1", tx).unwrap();

        hub.send_to("s1", OutboundEvent::LobbyDisbanded);
        assert_eq!(rx.recv().await, Some(OutboundEvent::LobbyDisbanded));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_lobby_members() {
        let hub = SessionHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.register_session("s1", tx1).unwrap();
        hub.register_session("s2", tx2).unwrap();
        hub.join_lobby("brisk-otter", "s1").unwrap();

        hub.broadcast("brisk-otter", OutboundEvent::LobbyDisbanded);
        assert_eq!(rx1.recv().await, Some(OutboundEvent::LobbyDisbanded));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_lobby_drops_subscribers() {
        let hub = SessionHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register_session("s1", tx).unwrap();
        hub.join_lobby("brisk-otter", "s1").unwrap();
        assert_eq!(hub.subscriber_count("brisk-otter"), 1);

        hub.close_lobby("brisk-otter");
        assert_eq!(hub.subscriber_count("brisk-otter"), 0);

        hub.broadcast("brisk-otter", OutboundEvent::LobbyDisbanded);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_detaches_everywhere() {
        let hub = SessionHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.register_session("s1", tx).unwrap();
        hub.join_lobby("brisk-otter", "s1").unwrap();

        hub.unregister_session("s1").unwrap();
        assert_eq!(hub.subscriber_count("brisk-otter"), 0);
    }
}
