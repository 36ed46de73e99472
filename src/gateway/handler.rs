//! Connection gateway: translates wire events into registry operations
//!
//! One `ConnectionState` exists per socket and tracks the session identity
//! plus the lobby it is currently joined to. The gateway holds no lobby
//! state of its own; it orders registry calls against hub subscriptions so
//! a session never receives the broadcast describing its own entry (it
//! gets the snapshot instead).

use crate::gateway::events::{InboundEvent, OutboundEvent};
use crate::gateway::hub::{Broadcaster, SessionHub};
use crate::lobby::registry::LobbyRegistry;
use crate::types::{LeaveReason, LobbyCode, LobbySnapshot, SessionId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-connection state carried by the socket task
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub session_id: SessionId,
    /// Set once the session has created or joined a lobby
    pub lobby_code: Option<LobbyCode>,
}

impl ConnectionState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            lobby_code: None,
        }
    }
}

/// Stateless dispatcher between inbound events and the registry
pub struct Gateway {
    registry: Arc<LobbyRegistry>,
    hub: Arc<SessionHub>,
}

impl Gateway {
    pub fn new(registry: Arc<LobbyRegistry>, hub: Arc<SessionHub>) -> Self {
        Self { registry, hub }
    }

    /// Handle one inbound event for a connection
    pub fn handle_event(&self, conn: &mut ConnectionState, event: InboundEvent) {
        match event {
            InboundEvent::CreateLobby { username } => self.handle_create(conn, username),
            InboundEvent::JoinLobby { code, username } => self.handle_join(conn, code, username),
            InboundEvent::ReconnectAttempt {
                previous_session_id,
                code,
                username,
            } => self.handle_reconnect(conn, previous_session_id, code, username),
            InboundEvent::ChatMessage { text } => self.handle_chat(conn, text),
        }
    }

    /// Handle the connection going away, for any reason
    pub fn handle_disconnect(&self, conn: &ConnectionState) {
        if let Some(code) = &conn.lobby_code {
            if let Err(error) =
                self.registry
                    .remove_participant(code, &conn.session_id, LeaveReason::Disconnection)
            {
                warn!("Failed to remove disconnected session from {code}: {error}");
            }
            let _ = self.hub.leave_lobby(code, &conn.session_id);
        }
        let _ = self.hub.unregister_session(&conn.session_id);
        debug!("Session {} disconnected", conn.session_id);
    }

    fn handle_create(&self, conn: &mut ConnectionState, username: String) {
        match self.registry.create_lobby(conn.session_id.clone(), username) {
            Ok(snapshot) => {
                self.enter_lobby(conn, &snapshot);
                self.hub
                    .send_to(&conn.session_id, OutboundEvent::LobbyCreated { snapshot });
            }
            Err(error) => self.send_error(conn, error),
        }
    }

    fn handle_join(&self, conn: &mut ConnectionState, code: String, username: String) {
        match self
            .registry
            .join_lobby(&code, conn.session_id.clone(), username)
        {
            Ok(snapshot) => {
                self.enter_lobby(conn, &snapshot);
                self.hub
                    .send_to(&conn.session_id, OutboundEvent::LobbyInfo { snapshot });
            }
            Err(error) => self.send_error(conn, error),
        }
    }

    fn handle_reconnect(
        &self,
        conn: &mut ConnectionState,
        previous_session_id: String,
        code: String,
        username: String,
    ) {
        match self
            .registry
            .reconnect(&code, &previous_session_id, conn.session_id.clone())
        {
            Ok(Some(snapshot)) => {
                self.enter_lobby(conn, &snapshot);
                self.hub
                    .send_to(&conn.session_id, OutboundEvent::ReconnectSuccess { snapshot });
            }
            // Grace window closed or no prior record: degrade to a fresh join.
            Ok(None) => {
                debug!("Reconnect window closed for lobby {code}; joining fresh");
                self.handle_join(conn, code, username);
            }
            Err(error) => self.send_error(conn, error),
        }
    }

    fn handle_chat(&self, conn: &ConnectionState, text: String) {
        let Some(code) = &conn.lobby_code else {
            warn!("Chat from session {} outside any lobby", conn.session_id);
            return;
        };
        if let Err(error) = self.registry.add_chat_message(code, &conn.session_id, text) {
            warn!("Failed to relay chat in {code}: {error}");
        }
    }

    /// Subscribe after the registry call so the entering session does not
    /// receive the broadcast describing itself.
    fn enter_lobby(&self, conn: &mut ConnectionState, snapshot: &LobbySnapshot) {
        let _ = self.hub.join_lobby(&snapshot.code, &conn.session_id);
        conn.lobby_code = Some(snapshot.code.clone());
    }

    fn send_error(&self, conn: &ConnectionState, error: anyhow::Error) {
        debug!("Rejecting event from session {}: {error}", conn.session_id);
        self.hub.send_to(
            &conn.session_id,
            OutboundEvent::Error {
                reason: error.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LobbySettings;
    use crate::metrics::MetricsCollector;
    use tokio::sync::mpsc;

    fn gateway_with(max_participants: usize) -> (Gateway, Arc<SessionHub>) {
        let hub = Arc::new(SessionHub::new());
        let settings = LobbySettings {
            max_participants,
            ..LobbySettings::default()
        };
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let registry = Arc::new(LobbyRegistry::new(
            settings,
            Arc::clone(&hub) as Arc<dyn Broadcaster>,
            metrics,
        ));
        (Gateway::new(registry, Arc::clone(&hub)), hub)
    }

    fn connect(hub: &SessionHub, session_id: &str) -> mpsc::UnboundedReceiver<OutboundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register_session(session_id, tx).unwrap();
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_create_flow_delivers_snapshot_only_to_creator() {
        let (gateway, hub) = gateway_with(8);
        let mut rx = connect(&hub, "s1");
        let mut conn = ConnectionState::new("s1".to_string());

        gateway.handle_event(
            &mut conn,
            InboundEvent::CreateLobby {
                username: "alice".to_string(),
            },
        );

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "lobby-created");
        assert!(conn.lobby_code.is_some());
    }

    #[tokio::test]
    async fn test_join_fans_out_to_existing_members() {
        let (gateway, hub) = gateway_with(8);
        let mut rx1 = connect(&hub, "s1");
        let mut rx2 = connect(&hub, "s2");
        let mut conn1 = ConnectionState::new("s1".to_string());
        let mut conn2 = ConnectionState::new("s2".to_string());

        gateway.handle_event(
            &mut conn1,
            InboundEvent::CreateLobby {
                username: "alice".to_string(),
            },
        );
        let code = conn1.lobby_code.clone().unwrap();
        drain(&mut rx1);

        gateway.handle_event(
            &mut conn2,
            InboundEvent::JoinLobby {
                code: code.to_uppercase(),
                username: "bob".to_string(),
            },
        );

        // Alice sees the join notice and the refreshed roster.
        let to_alice = drain(&mut rx1);
        assert!(to_alice.iter().any(|e| e.name() == "chat-message"));
        assert!(to_alice.iter().any(|e| e.name() == "player-list"));

        // Bob gets only the snapshot, not his own join broadcast.
        let to_bob = drain(&mut rx2);
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob[0].name(), "lobby-info");
    }

    #[tokio::test]
    async fn test_join_unknown_code_errors_only_originator() {
        let (gateway, hub) = gateway_with(8);
        let mut rx = connect(&hub, "s1");
        let mut conn = ConnectionState::new("s1".to_string());

        gateway.handle_event(
            &mut conn,
            InboundEvent::JoinLobby {
                code: "no-such".to_string(),
                username: "alice".to_string(),
            },
        );

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            OutboundEvent::Error { reason } => assert!(reason.contains("no-such")),
            other => panic!("Expected error event, got {}", other.name()),
        }
        assert!(conn.lobby_code.is_none());
    }

    #[tokio::test]
    async fn test_full_lobby_rejection() {
        let (gateway, hub) = gateway_with(1);
        connect(&hub, "s1");
        let mut rx2 = connect(&hub, "s2");
        let mut conn1 = ConnectionState::new("s1".to_string());
        let mut conn2 = ConnectionState::new("s2".to_string());

        gateway.handle_event(
            &mut conn1,
            InboundEvent::CreateLobby {
                username: "alice".to_string(),
            },
        );
        gateway.handle_event(
            &mut conn2,
            InboundEvent::JoinLobby {
                code: conn1.lobby_code.clone().unwrap(),
                username: "bob".to_string(),
            },
        );

        let events = drain(&mut rx2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "error");
        assert!(conn2.lobby_code.is_none());
    }

    #[tokio::test]
    async fn test_chat_relayed_to_other_members() {
        let (gateway, hub) = gateway_with(8);
        let mut rx1 = connect(&hub, "s1");
        connect(&hub, "s2");
        let mut conn1 = ConnectionState::new("s1".to_string());
        let mut conn2 = ConnectionState::new("s2".to_string());

        gateway.handle_event(
            &mut conn1,
            InboundEvent::CreateLobby {
                username: "alice".to_string(),
            },
        );
        gateway.handle_event(
            &mut conn2,
            InboundEvent::JoinLobby {
                code: conn1.lobby_code.clone().unwrap(),
                username: "bob".to_string(),
            },
        );
        drain(&mut rx1);

        gateway.handle_event(
            &mut conn2,
            InboundEvent::ChatMessage {
                text: "hello".to_string(),
            },
        );

        let to_alice = drain(&mut rx1);
        assert_eq!(to_alice.len(), 1);
        match &to_alice[0] {
            OutboundEvent::ChatMessage { message } => {
                assert_eq!(message.text, "hello");
                assert_eq!(message.author.as_ref().unwrap().username, "bob");
            }
            other => panic!("Expected chat message, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_disconnect_removes_and_unsubscribes() {
        let (gateway, hub) = gateway_with(8);
        let mut rx1 = connect(&hub, "s1");
        connect(&hub, "s2");
        let mut conn1 = ConnectionState::new("s1".to_string());
        let mut conn2 = ConnectionState::new("s2".to_string());

        gateway.handle_event(
            &mut conn1,
            InboundEvent::CreateLobby {
                username: "alice".to_string(),
            },
        );
        let code = conn1.lobby_code.clone().unwrap();
        gateway.handle_event(
            &mut conn2,
            InboundEvent::JoinLobby {
                code: code.clone(),
                username: "bob".to_string(),
            },
        );
        drain(&mut rx1);

        gateway.handle_disconnect(&conn2);

        let to_alice = drain(&mut rx1);
        assert!(to_alice.iter().any(|e| match e {
            OutboundEvent::ChatMessage { message } =>
                message.text.contains("bob left (disconnection)"),
            _ => false,
        }));
        assert!(to_alice.iter().any(|e| e.name() == "player-list"));
        assert_eq!(hub.subscriber_count(&code), 1);
    }

    #[tokio::test]
    async fn test_reconnect_attempt_success_and_fallback() {
        let (gateway, hub) = gateway_with(8);
        connect(&hub, "s1");
        let mut conn1 = ConnectionState::new("s1".to_string());
        gateway.handle_event(
            &mut conn1,
            InboundEvent::CreateLobby {
                username: "alice".to_string(),
            },
        );
        let code = conn1.lobby_code.clone().unwrap();

        // An unclean transport drop delivers no disconnect event, so the
        // participant record survives and the grace window applies.
        let mut rx_new = connect(&hub, "s1-new");
        let mut conn_new = ConnectionState::new("s1-new".to_string());
        gateway.handle_event(
            &mut conn_new,
            InboundEvent::ReconnectAttempt {
                previous_session_id: "s1".to_string(),
                code: code.clone(),
                username: "alice".to_string(),
            },
        );
        let events = drain(&mut rx_new);
        assert_eq!(events.last().unwrap().name(), "reconnect-success");

        // A ghost session id degrades to a fresh join.
        let mut rx_ghost = connect(&hub, "s9");
        let mut conn_ghost = ConnectionState::new("s9".to_string());
        gateway.handle_event(
            &mut conn_ghost,
            InboundEvent::ReconnectAttempt {
                previous_session_id: "never-existed".to_string(),
                code,
                username: "carol".to_string(),
            },
        );
        let events = drain(&mut rx_ghost);
        assert_eq!(events.last().unwrap().name(), "lobby-info");
    }
}
