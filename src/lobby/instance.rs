//! Lobby instance implementation and lifecycle management
//!
//! This module contains the core lobby logic: the insertion-ordered
//! participant roster, the append-only message log, host assignment, and
//! the reconnection window checks. Everything here is pure state
//! manipulation; timers and broadcast fan-out live in the registry and
//! gateway layers.

use crate::config::LobbySettings;
use crate::error::{LobbyError, Result};
use crate::types::{
    LeaveReason, LobbyCode, LobbySnapshot, Message, MessageAuthor, Participant, RosterEntry,
    SessionId, COLOR_PALETTE,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};

/// Possible states of a lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    /// Lobby is live and accepting operations
    Active,
    /// Lobby has been disbanded (terminal state)
    Disbanded,
}

/// Result of seating a new participant
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub participant: Participant,
    /// System "joined" notice appended to the log
    pub notice: Message,
}

/// Result of removing a participant
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub participant: Participant,
    /// System "left" notice appended to the log
    pub notice: Message,
    /// True if host had to be re-derived after this removal
    pub host_changed: bool,
    /// True if this removal emptied the lobby
    pub now_empty: bool,
}

/// Result of re-keying a participant onto a new session
#[derive(Debug, Clone)]
pub struct ReconnectOutcome {
    pub participant: Participant,
    /// System "reconnected" notice appended to the log
    pub notice: Message,
}

/// A single lobby: roster, message log, and host bookkeeping.
#[derive(Debug, Clone)]
pub struct LobbyInstance {
    code: LobbyCode,
    settings: LobbySettings,
    state: LobbyState,
    created_at: DateTime<Utc>,
    /// Insertion order preserved; join order determines color and host
    /// precedence.
    participants: Vec<Participant>,
    messages: Vec<Message>,
    /// Explicit host assignment; reassigned only when the host departs,
    /// never recomputed from container order.
    host_session_id: Option<SessionId>,
}

impl LobbyInstance {
    /// Create a new, empty lobby under the given code
    pub fn new(code: LobbyCode, settings: LobbySettings) -> Self {
        Self {
            code,
            settings,
            state: LobbyState::Active,
            created_at: current_timestamp(),
            participants: Vec::new(),
            messages: Vec::new(),
            host_session_id: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.settings.max_participants
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn host_session_id(&self) -> Option<&str> {
        self.host_session_id.as_deref()
    }

    pub fn participant(&self, session_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.session_id == session_id)
    }

    /// True once the lobby's absolute lifetime has elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= self.settings.lifetime_window()
    }

    /// Seat a new participant.
    ///
    /// Fails with `LobbyFull` at capacity, without mutating the roster.
    /// The first participant of a lobby becomes its host.
    pub fn add_participant(
        &mut self,
        session_id: SessionId,
        username: impl Into<String>,
    ) -> Result<JoinOutcome> {
        if self.is_full() {
            return Err(LobbyError::LobbyFull {
                code: self.code.clone(),
            }
            .into());
        }

        let username = username.into();
        let participant = Participant {
            session_id: session_id.clone(),
            username: username.clone(),
            color: COLOR_PALETTE[self.participants.len() % COLOR_PALETTE.len()].to_string(),
            last_active_at: current_timestamp(),
        };
        self.participants.push(participant.clone());

        if self.host_session_id.is_none() {
            self.host_session_id = Some(session_id);
        }

        let notice = Message::system(format!("{username} joined"));
        self.messages.push(notice.clone());

        Ok(JoinOutcome {
            participant,
            notice,
        })
    }

    /// Remove a participant.
    ///
    /// Idempotent: unknown session ids are a no-op (`None`). If the host
    /// departs, the earliest remaining participant is promoted.
    pub fn remove_participant(
        &mut self,
        session_id: &str,
        reason: LeaveReason,
    ) -> Option<LeaveOutcome> {
        let index = self
            .participants
            .iter()
            .position(|p| p.session_id == session_id)?;
        let participant = self.participants.remove(index);

        let was_host = self.host_session_id.as_deref() == Some(session_id);
        let mut host_changed = false;
        if was_host {
            self.host_session_id = self.participants.first().map(|p| p.session_id.clone());
            host_changed = self.host_session_id.is_some();
        }

        let notice = Message::system(format!("{} left ({reason})", participant.username));
        self.messages.push(notice.clone());

        let now_empty = self.participants.is_empty();
        Some(LeaveOutcome {
            participant,
            notice,
            host_changed,
            now_empty,
        })
    }

    /// Append a chat message stamped with the sender's identity at call
    /// time. No-op (`None`) if the session is not a current participant.
    pub fn add_chat_message(&mut self, session_id: &str, text: impl Into<String>) -> Option<Message> {
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.session_id == session_id)?;
        participant.last_active_at = current_timestamp();

        let message = Message::chat(
            MessageAuthor {
                username: participant.username.clone(),
                color: participant.color.clone(),
            },
            text,
        );
        self.messages.push(message.clone());
        Some(message)
    }

    /// Whether a disconnected session may resume its prior identity.
    ///
    /// Requires the prior record to still exist, its inactivity window to
    /// be open, and the lobby's absolute lifetime not to have elapsed.
    pub fn can_reconnect(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        let Some(participant) = self.participant(session_id) else {
            return false;
        };
        now - participant.last_active_at < self.settings.inactivity_window()
            && now - self.created_at < self.settings.lifetime_window()
    }

    /// Re-key a participant onto a new session id.
    ///
    /// The entry keeps its insertion position, so host precedence is
    /// unaffected. Fails (`None`) if the prior record is gone.
    pub fn reconnect(
        &mut self,
        old_session_id: &str,
        new_session_id: SessionId,
    ) -> Option<ReconnectOutcome> {
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.session_id == old_session_id)?;
        participant.session_id = new_session_id.clone();
        participant.last_active_at = current_timestamp();
        let snapshot = participant.clone();

        // The host keeps the role across reconnects; only the key changes.
        if self.host_session_id.as_deref() == Some(old_session_id) {
            self.host_session_id = Some(new_session_id);
        }

        let notice = Message::system(format!("{} reconnected", snapshot.username));
        self.messages.push(notice.clone());

        Some(ReconnectOutcome {
            participant: snapshot,
            notice,
        })
    }

    /// Ordered roster projection, always reflecting current order and host
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.participants
            .iter()
            .map(|p| RosterEntry {
                username: p.username.clone(),
                color: p.color.clone(),
                is_host: self.host_session_id.as_deref() == Some(p.session_id.as_str()),
            })
            .collect()
    }

    /// Full lobby state for the given session (its color, the roster, and
    /// the complete message log)
    pub fn snapshot_for(&self, session_id: &str) -> Option<LobbySnapshot> {
        let participant = self.participant(session_id)?;
        Some(LobbySnapshot {
            code: self.code.clone(),
            created_at: self.created_at,
            color: participant.color.clone(),
            players: self.roster(),
            messages: self.messages.clone(),
        })
    }

    /// Terminal transition; the registry drops the instance afterwards
    pub fn mark_disbanded(&mut self) {
        self.state = LobbyState::Disbanded;
    }

    /// Backdate a participant's activity (for testing windows)
    #[cfg(test)]
    pub fn set_last_active(&mut self, session_id: &str, at: DateTime<Utc>) {
        if let Some(p) = self
            .participants
            .iter_mut()
            .find(|p| p.session_id == session_id)
        {
            p.last_active_at = at;
        }
    }

    /// Backdate the lobby's creation time (for testing expiry)
    #[cfg(test)]
    pub fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_lobby(max: usize) -> LobbyInstance {
        let settings = LobbySettings {
            max_participants: max,
            ..LobbySettings::default()
        };
        LobbyInstance::new("brisk-otter".to_string(), settings)
    }

    #[test]
    fn test_first_participant_becomes_host() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        lobby.add_participant("s2".to_string(), "bob").unwrap();

        let roster = lobby.roster();
        assert_eq!(roster.len(), 2);
        assert!(roster[0].is_host);
        assert!(!roster[1].is_host);
        assert_eq!(lobby.host_session_id(), Some("s1"));
    }

    #[test]
    fn test_capacity_rejected_without_mutation() {
        let mut lobby = small_lobby(2);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        lobby.add_participant("s2".to_string(), "bob").unwrap();

        let err = lobby
            .add_participant("s3".to_string(), "carol")
            .unwrap_err();
        let lobby_err = err.downcast_ref::<LobbyError>().unwrap();
        assert!(matches!(lobby_err, LobbyError::LobbyFull { .. }));
        assert_eq!(lobby.participant_count(), 2);
        // No "carol joined" notice leaked into the log.
        assert!(!lobby
            .snapshot_for("s1")
            .unwrap()
            .messages
            .iter()
            .any(|m| m.text.contains("carol")));
    }

    #[test]
    fn test_colors_assigned_by_join_order() {
        let mut lobby = small_lobby(COLOR_PALETTE.len() + 1);
        for i in 0..=COLOR_PALETTE.len() {
            lobby
                .add_participant(format!("s{i}"), format!("user{i}"))
                .unwrap();
        }
        let first = lobby.participant("s0").unwrap();
        let wrapped = lobby.participant(&format!("s{}", COLOR_PALETTE.len())).unwrap();
        assert_eq!(first.color, COLOR_PALETTE[0]);
        // Palette wraps around once exhausted.
        assert_eq!(wrapped.color, COLOR_PALETTE[0]);
    }

    #[test]
    fn test_host_handoff_to_earliest_remaining() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        lobby.add_participant("s2".to_string(), "bob").unwrap();
        lobby.add_participant("s3".to_string(), "carol").unwrap();

        let outcome = lobby
            .remove_participant("s1", LeaveReason::Disconnection)
            .unwrap();
        assert!(outcome.host_changed);
        assert!(!outcome.now_empty);
        assert_eq!(lobby.host_session_id(), Some("s2"));
        assert!(lobby.roster()[0].is_host);
    }

    #[test]
    fn test_non_host_removal_keeps_host() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        lobby.add_participant("s2".to_string(), "bob").unwrap();

        let outcome = lobby
            .remove_participant("s2", LeaveReason::Kicked)
            .unwrap();
        assert!(!outcome.host_changed);
        assert_eq!(lobby.host_session_id(), Some("s1"));
        assert!(outcome.notice.text.contains("kicked"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        assert!(lobby
            .remove_participant("s1", LeaveReason::Disconnection)
            .is_some());
        assert!(lobby
            .remove_participant("s1", LeaveReason::Disconnection)
            .is_none());
        assert!(lobby.remove_participant("unknown", LeaveReason::Kicked).is_none());
    }

    #[test]
    fn test_last_removal_reports_empty() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        let outcome = lobby
            .remove_participant("s1", LeaveReason::Disconnection)
            .unwrap();
        assert!(outcome.now_empty);
        assert!(!outcome.host_changed);
        assert!(lobby.is_empty());
        assert_eq!(lobby.host_session_id(), None);
    }

    #[test]
    fn test_chat_from_unknown_session_is_noop() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        assert!(lobby.add_chat_message("ghost", "boo").is_none());

        let log = lobby.snapshot_for("s1").unwrap().messages;
        assert_eq!(log.len(), 1); // only the join notice
    }

    #[test]
    fn test_chat_message_stamped_with_sender_identity() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        let message = lobby.add_chat_message("s1", "hello").unwrap();

        let author = message.author.unwrap();
        assert_eq!(author.username, "alice");
        assert_eq!(author.color, COLOR_PALETTE[0]);
    }

    #[test]
    fn test_chat_survives_author_leaving() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        lobby.add_participant("s2".to_string(), "bob").unwrap();
        lobby.add_chat_message("s2", "bye").unwrap();
        lobby
            .remove_participant("s2", LeaveReason::Disconnection)
            .unwrap();

        let log = lobby.snapshot_for("s1").unwrap().messages;
        let chat = log
            .iter()
            .find(|m| m.kind == crate::types::MessageKind::Chat)
            .unwrap();
        assert_eq!(chat.author.as_ref().unwrap().username, "bob");
    }

    #[test]
    fn test_message_log_is_append_only_and_ordered() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        lobby.add_chat_message("s1", "one").unwrap();
        lobby.add_chat_message("s1", "two").unwrap();
        lobby.add_participant("s2".to_string(), "bob").unwrap();

        let texts: Vec<String> = lobby
            .snapshot_for("s1")
            .unwrap()
            .messages
            .iter()
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(texts, vec!["alice joined", "one", "two", "bob joined"]);
        // Both snapshots observe the identical order.
        assert_eq!(
            lobby.snapshot_for("s1").unwrap().messages,
            lobby.snapshot_for("s2").unwrap().messages
        );
    }

    #[test]
    fn test_can_reconnect_within_windows() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        let now = current_timestamp();

        assert!(lobby.can_reconnect("s1", now));
        assert!(!lobby.can_reconnect("ghost", now));

        // 5 minutes idle: still inside the window.
        lobby.set_last_active("s1", now - chrono::Duration::minutes(5));
        assert!(lobby.can_reconnect("s1", now));

        // 11 minutes idle: inactivity window elapsed.
        lobby.set_last_active("s1", now - chrono::Duration::minutes(11));
        assert!(!lobby.can_reconnect("s1", now));
    }

    #[test]
    fn test_can_reconnect_respects_lobby_lifetime() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        let now = current_timestamp();

        lobby.set_created_at(now - chrono::Duration::minutes(61));
        lobby.set_last_active("s1", now - chrono::Duration::minutes(1));
        assert!(!lobby.can_reconnect("s1", now));
        assert!(lobby.is_expired(now));
    }

    #[test]
    fn test_reconnect_rekeys_in_place_and_keeps_host() {
        let mut lobby = small_lobby(4);
        lobby.add_participant("s1".to_string(), "alice").unwrap();
        lobby.add_participant("s2".to_string(), "bob").unwrap();

        let outcome = lobby.reconnect("s1", "s1-new".to_string()).unwrap();
        assert_eq!(outcome.participant.username, "alice");
        assert_eq!(lobby.host_session_id(), Some("s1-new"));

        // Insertion position is preserved: alice is still first.
        let roster = lobby.roster();
        assert_eq!(roster[0].username, "alice");
        assert!(roster[0].is_host);
        assert!(lobby.participant("s1").is_none());
        assert!(lobby.participant("s1-new").is_some());
    }

    #[test]
    fn test_reconnect_of_unknown_session_fails() {
        let mut lobby = small_lobby(4);
        assert!(lobby.reconnect("ghost", "new".to_string()).is_none());
    }
}
