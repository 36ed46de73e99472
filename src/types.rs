//! Common types used throughout the lobby service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for transport sessions (changes across reconnects)
pub type SessionId = String;

/// Human-readable lobby identifier, always stored lowercase
pub type LobbyCode = String;

/// Fixed palette participants are colored from, indexed by join order
/// modulo palette size.
pub const COLOR_PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#46c5d0", "#f032e6", "#9a6324",
];

/// Kind of entry in a lobby's message log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    System,
}

/// Reason why a participant left a lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveReason {
    Disconnection,
    Inactivity,
    Kicked,
}

impl std::fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaveReason::Disconnection => write!(f, "disconnection"),
            LeaveReason::Inactivity => write!(f, "inactivity"),
            LeaveReason::Kicked => write!(f, "kicked"),
        }
    }
}

/// Identity a chat message was stamped with at send time.
///
/// Captured by value so the message survives its author leaving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub username: String,
    pub color: String,
}

/// Single entry in a lobby's append-only message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<MessageAuthor>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a chat message stamped with the sender's current identity
    pub fn chat(author: MessageAuthor, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Chat,
            author: Some(author),
            text: text.into(),
            timestamp: crate::utils::current_timestamp(),
        }
    }

    /// Create a system notice (join/leave/reconnect)
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::System,
            author: None,
            text: text.into(),
            timestamp: crate::utils::current_timestamp(),
        }
    }
}

/// A participant currently present in a lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub username: String,
    pub color: String,
    pub last_active_at: DateTime<Utc>,
}

/// Read-only roster projection broadcast as `player-list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub username: String,
    pub color: String,
    pub is_host: bool,
}

/// Full lobby state sent to a session that joins or reconnects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub code: LobbyCode,
    pub created_at: DateTime<Utc>,
    /// Color assigned to the receiving session
    pub color: String,
    pub players: Vec<RosterEntry>,
    pub messages: Vec<Message>,
}
