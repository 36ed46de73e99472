//! Wire-level events exchanged with connected sessions
//!
//! Both directions are tagged JSON unions. Inbound events arrive over the
//! WebSocket; outbound events are fanned out by the hub to a single
//! session or to every session joined to a lobby code.

use crate::types::{LobbySnapshot, Message, RosterEntry};
use serde::{Deserialize, Serialize};

/// Events a connected session may send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// Create a fresh lobby and join it as host
    CreateLobby { username: String },
    /// Join an existing lobby by code (case-insensitive)
    JoinLobby { code: String, username: String },
    /// Resume a prior identity after a transport drop; falls back to a
    /// fresh join when the grace window has closed
    ReconnectAttempt {
        previous_session_id: String,
        code: String,
        username: String,
    },
    /// Chat within the currently joined lobby
    ChatMessage { text: String },
}

/// Events delivered to connected sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundEvent {
    /// Sent to the creator after `create-lobby`
    LobbyCreated {
        #[serde(flatten)]
        snapshot: LobbySnapshot,
    },
    /// Sent to the joiner after `join-lobby` (including reconnect fallback)
    LobbyInfo {
        #[serde(flatten)]
        snapshot: LobbySnapshot,
    },
    /// Sent to the reconnecting session with its full prior history
    ReconnectSuccess {
        #[serde(flatten)]
        snapshot: LobbySnapshot,
    },
    /// Refreshed ordered roster, broadcast to the lobby
    PlayerList { players: Vec<RosterEntry> },
    /// A chat or system message, broadcast to the lobby
    ChatMessage { message: Message },
    /// Failure reason, sent only to the originating session
    Error { reason: String },
    /// Terminal notice, broadcast when a lobby is disposed
    LobbyDisbanded,
}

impl OutboundEvent {
    /// Stable name of the event variant, mainly for logging and tests
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::LobbyCreated { .. } => "lobby-created",
            OutboundEvent::LobbyInfo { .. } => "lobby-info",
            OutboundEvent::ReconnectSuccess { .. } => "reconnect-success",
            OutboundEvent::PlayerList { .. } => "player-list",
            OutboundEvent::ChatMessage { .. } => "chat-message",
            OutboundEvent::Error { .. } => "error",
            OutboundEvent::LobbyDisbanded => "lobby-disbanded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_event_wire_format() {
        let event: InboundEvent =
            serde_json::from_str(r#"{"type":"create-lobby","username":"alice"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::CreateLobby {
                username: "alice".to_string()
            }
        );

        let event: InboundEvent = serde_json::from_str(
            r#"{"type":"join-lobby","code":"Brisk-Otter","username":"bob"}"#,
        )
        .unwrap();
        assert!(matches!(event, InboundEvent::JoinLobby { .. }));

        let event: InboundEvent = serde_json::from_str(
            r#"{"type":"reconnect-attempt","previous_session_id":"abc","code":"brisk-otter","username":"bob"}"#,
        )
        .unwrap();
        assert!(matches!(event, InboundEvent::ReconnectAttempt { .. }));
    }

    #[test]
    fn test_outbound_event_tag_names() {
        let json =
            serde_json::to_value(&OutboundEvent::LobbyDisbanded).unwrap();
        assert_eq!(json["type"], "lobby-disbanded");

        let json = serde_json::to_value(&OutboundEvent::Error {
            reason: "Lobby is full: brisk-otter".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["reason"], "Lobby is full: brisk-otter");
    }

    #[test]
    fn test_snapshot_fields_are_flattened() {
        let snapshot = LobbySnapshot {
            code: "brisk-otter".to_string(),
            created_at: crate::utils::current_timestamp(),
            color: "#e6194b".to_string(),
            players: vec![],
            messages: vec![],
        };
        let json = serde_json::to_value(&OutboundEvent::LobbyCreated { snapshot }).unwrap();
        assert_eq!(json["type"], "lobby-created");
        assert_eq!(json["code"], "brisk-otter");
        assert!(json["players"].is_array());
    }
}
