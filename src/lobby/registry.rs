//! Lobby registry: the single authority over live lobbies
//!
//! All lobby mutation goes through here. Every operation takes the write
//! lock, mutates, and fans events out through the `Broadcaster` before
//! returning, so from a caller's point of view each operation is atomic:
//! there is no window where the map and the broadcast state disagree.
//!
//! The registry also owns the per-lobby lifetime timers and the
//! per-participant presence timers. Timer tasks hold an `Arc` back to the
//! registry and call into the same operations as everyone else.

use crate::config::LobbySettings;
use crate::error::{LobbyError, Result};
use crate::gateway::events::OutboundEvent;
use crate::gateway::hub::Broadcaster;
use crate::lobby::codes::generate_unique_code;
use crate::lobby::instance::LobbyInstance;
use crate::metrics::MetricsCollector;
use crate::presence::PresenceTimer;
use crate::types::{LeaveReason, LobbyCode, LobbySnapshot, RosterEntry, SessionId};
use crate::utils::{current_timestamp, normalize_code};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a lobby was disposed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisbandCause {
    /// Last participant left
    Emptied,
    /// Absolute lifetime elapsed
    Expired,
    /// Service shut down
    Shutdown,
}

impl DisbandCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbandCause::Emptied => "emptied",
            DisbandCause::Expired => "expired",
            DisbandCause::Shutdown => "shutdown",
        }
    }
}

/// Counters exposed on the stats endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    pub lobbies_created: u64,
    pub lobbies_disbanded: u64,
    pub participants_joined: u64,
    pub reconnects: u64,
    pub messages_sent: u64,
    /// Live gauge, computed at read time
    pub active_lobbies: usize,
    /// Live gauge, computed at read time
    pub participants_present: usize,
}

/// A live lobby plus the timers attached to it.
///
/// The expiry handle is aborted on every disband path except expiry
/// itself, where the task is already finishing. Presence timers are keyed
/// by the session they watch and must be canceled whenever that
/// participant record goes away.
struct LobbyEntry {
    lobby: LobbyInstance,
    expiry: JoinHandle<()>,
    presence: HashMap<SessionId, PresenceTimer>,
}

/// Registry of live lobbies, keyed by normalized (lowercase) code.
pub struct LobbyRegistry {
    lobbies: RwLock<HashMap<LobbyCode, LobbyEntry>>,
    settings: LobbySettings,
    broadcaster: Arc<dyn Broadcaster>,
    stats: RwLock<RegistryStats>,
    metrics: Arc<MetricsCollector>,
}

impl LobbyRegistry {
    pub fn new(
        settings: LobbySettings,
        broadcaster: Arc<dyn Broadcaster>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            lobbies: RwLock::new(HashMap::new()),
            settings,
            broadcaster,
            stats: RwLock::new(RegistryStats::default()),
            metrics,
        }
    }

    /// Create a fresh lobby under a newly generated code and seat the
    /// creator as its host. Returns the creator's snapshot.
    pub fn create_lobby(
        self: &Arc<Self>,
        session_id: SessionId,
        username: impl Into<String>,
    ) -> Result<LobbySnapshot> {
        let username = username.into();
        let (code, snapshot, roster, notice, gauges) = {
            let mut lobbies = self.write_lobbies()?;
            let code = generate_unique_code(|candidate| lobbies.contains_key(candidate));

            let mut lobby = LobbyInstance::new(code.clone(), self.settings.clone());
            // An empty lobby can never be full, but keep the error path honest.
            let outcome = lobby.add_participant(session_id.clone(), username.clone())?;
            let snapshot = lobby
                .snapshot_for(&session_id)
                .ok_or_else(|| LobbyError::InternalError {
                    message: format!("Missing snapshot for creator of {code}"),
                })?;
            let roster = lobby.roster();

            let mut presence = HashMap::new();
            presence.insert(
                session_id.clone(),
                PresenceTimer::spawn(
                    Arc::clone(self),
                    code.clone(),
                    session_id.clone(),
                    self.settings.presence_interval(),
                ),
            );
            let expiry = self.spawn_expiry(code.clone());
            lobbies.insert(
                code.clone(),
                LobbyEntry {
                    lobby,
                    expiry,
                    presence,
                },
            );
            let gauges = Self::gauges(&lobbies);
            (code, snapshot, roster, outcome.notice, gauges)
        };

        self.bump(|s| {
            s.lobbies_created += 1;
            s.participants_joined += 1;
        });
        self.metrics.record_lobby_created();
        self.metrics.record_participant_joined();
        self.publish_gauges(gauges);
        info!("Created lobby {code} (host {username})");

        self.broadcaster
            .broadcast(&code, OutboundEvent::ChatMessage { message: notice });
        self.broadcaster
            .broadcast(&code, OutboundEvent::PlayerList { players: roster });
        Ok(snapshot)
    }

    /// Seat a participant in an existing lobby.
    ///
    /// The code is matched case-insensitively. Fails with `InvalidCode`
    /// for unknown codes and `LobbyFull` at capacity.
    pub fn join_lobby(
        self: &Arc<Self>,
        code: &str,
        session_id: SessionId,
        username: impl Into<String>,
    ) -> Result<LobbySnapshot> {
        let normalized = normalize_code(code);
        let username = username.into();
        let (snapshot, roster, notice, gauges) = {
            let mut lobbies = self.write_lobbies()?;
            let entry = lobbies
                .get_mut(&normalized)
                .ok_or_else(|| LobbyError::InvalidCode {
                    code: code.to_string(),
                })?;
            let outcome = entry.lobby.add_participant(session_id.clone(), username.clone())?;
            entry.presence.insert(
                session_id.clone(),
                PresenceTimer::spawn(
                    Arc::clone(self),
                    normalized.clone(),
                    session_id.clone(),
                    self.settings.presence_interval(),
                ),
            );
            let snapshot = entry
                .lobby
                .snapshot_for(&session_id)
                .ok_or_else(|| LobbyError::InternalError {
                    message: format!("Missing snapshot for joiner of {normalized}"),
                })?;
            let roster = entry.lobby.roster();
            let gauges = Self::gauges(&lobbies);
            (snapshot, roster, outcome.notice, gauges)
        };

        self.bump(|s| s.participants_joined += 1);
        self.metrics.record_participant_joined();
        self.publish_gauges(gauges);
        debug!("Session joined lobby {normalized} as {username}");

        self.broadcaster
            .broadcast(&normalized, OutboundEvent::ChatMessage { message: notice });
        self.broadcaster
            .broadcast(&normalized, OutboundEvent::PlayerList { players: roster });
        Ok(snapshot)
    }

    /// Whether a dropped session may still resume its identity in a lobby
    pub fn can_reconnect(&self, code: &str, session_id: &str) -> bool {
        let normalized = normalize_code(code);
        let Ok(lobbies) = self.lobbies.read() else {
            return false;
        };
        lobbies
            .get(&normalized)
            .map(|entry| entry.lobby.can_reconnect(session_id, current_timestamp()))
            .unwrap_or(false)
    }

    /// Resume a dropped session under a new session id.
    ///
    /// Returns `Ok(None)` when the grace window has closed or no prior
    /// record exists; the caller is expected to fall back to a fresh join.
    pub fn reconnect(
        self: &Arc<Self>,
        code: &str,
        old_session_id: &str,
        new_session_id: SessionId,
    ) -> Result<Option<LobbySnapshot>> {
        let normalized = normalize_code(code);
        let (snapshot, roster, notice) = {
            let mut lobbies = self.write_lobbies()?;
            let Some(entry) = lobbies.get_mut(&normalized) else {
                return Ok(None);
            };
            if !entry.lobby.can_reconnect(old_session_id, current_timestamp()) {
                return Ok(None);
            }
            let Some(outcome) = entry.lobby.reconnect(old_session_id, new_session_id.clone())
            else {
                return Ok(None);
            };
            // The old timer watches a key that no longer exists.
            if let Some(timer) = entry.presence.remove(old_session_id) {
                timer.cancel();
            }
            entry.presence.insert(
                new_session_id.clone(),
                PresenceTimer::spawn(
                    Arc::clone(self),
                    normalized.clone(),
                    new_session_id.clone(),
                    self.settings.presence_interval(),
                ),
            );
            let snapshot = entry
                .lobby
                .snapshot_for(&new_session_id)
                .ok_or_else(|| LobbyError::InternalError {
                    message: format!("Missing snapshot after reconnect in {normalized}"),
                })?;
            (snapshot, entry.lobby.roster(), outcome.notice)
        };

        self.bump(|s| s.reconnects += 1);
        self.metrics.record_reconnect();
        info!("Session reconnected to lobby {normalized}");

        self.broadcaster
            .broadcast(&normalized, OutboundEvent::ChatMessage { message: notice });
        self.broadcaster
            .broadcast(&normalized, OutboundEvent::PlayerList { players: roster });
        Ok(Some(snapshot))
    }

    /// Append a chat message and fan it out to the lobby.
    ///
    /// Unknown codes and non-participant senders are a silent no-op.
    pub fn add_chat_message(
        &self,
        code: &str,
        session_id: &str,
        text: impl Into<String>,
    ) -> Result<()> {
        let normalized = normalize_code(code);
        let message = {
            let mut lobbies = self.write_lobbies()?;
            let Some(entry) = lobbies.get_mut(&normalized) else {
                return Ok(());
            };
            entry.lobby.add_chat_message(session_id, text)
        };

        if let Some(message) = message {
            self.bump(|s| s.messages_sent += 1);
            self.metrics.record_chat_message();
            self.broadcaster
                .broadcast(&normalized, OutboundEvent::ChatMessage { message });
        }
        Ok(())
    }

    /// Remove a participant and fan out the consequences.
    ///
    /// Idempotent: unknown codes or session ids are a no-op. The departing
    /// session's presence timer is canceled before anything is broadcast.
    /// If the removal empties the lobby it is disbanded immediately.
    pub fn remove_participant(
        &self,
        code: &str,
        session_id: &str,
        reason: LeaveReason,
    ) -> Result<()> {
        let normalized = normalize_code(code);
        let (notice, roster, disbanded, gauges) = {
            let mut lobbies = self.write_lobbies()?;
            let Some(entry) = lobbies.get_mut(&normalized) else {
                return Ok(());
            };
            let Some(outcome) = entry.lobby.remove_participant(session_id, reason) else {
                return Ok(());
            };
            if let Some(timer) = entry.presence.remove(session_id) {
                timer.cancel();
            }
            let roster = entry.lobby.roster();
            let disbanded = outcome.now_empty;
            if disbanded {
                if let Some(mut entry) = lobbies.remove(&normalized) {
                    entry.lobby.mark_disbanded();
                    entry.expiry.abort();
                    for (_, timer) in entry.presence.drain() {
                        timer.cancel();
                    }
                }
            }
            let gauges = Self::gauges(&lobbies);
            (outcome.notice, roster, disbanded, gauges)
        };

        self.metrics.record_participant_left(&reason.to_string());
        self.publish_gauges(gauges);
        debug!("Session left lobby {normalized} ({reason})");

        self.broadcaster
            .broadcast(&normalized, OutboundEvent::ChatMessage { message: notice });
        if disbanded {
            self.bump(|s| s.lobbies_disbanded += 1);
            self.metrics.record_lobby_disbanded(DisbandCause::Emptied.as_str());
            info!("Disbanded emptied lobby {normalized}");
            self.broadcaster
                .broadcast(&normalized, OutboundEvent::LobbyDisbanded);
            self.broadcaster.close_lobby(&normalized);
        } else {
            self.broadcaster
                .broadcast(&normalized, OutboundEvent::PlayerList { players: roster });
        }
        Ok(())
    }

    /// Presence tick: evict the session if it has been idle past the
    /// inactivity threshold.
    ///
    /// Returns true when the watching timer should stop, either because
    /// the session was evicted here or is already gone.
    pub fn evict_if_inactive(&self, code: &str, session_id: &str) -> bool {
        let idle = {
            let Ok(lobbies) = self.lobbies.read() else {
                return true;
            };
            let Some(entry) = lobbies.get(code) else {
                return true;
            };
            let Some(participant) = entry.lobby.participant(session_id) else {
                return true;
            };
            current_timestamp() - participant.last_active_at >= self.settings.inactivity_window()
        };
        if !idle {
            return false;
        }

        info!("Evicting idle session from lobby {code}");
        if let Err(error) = self.remove_participant(code, session_id, LeaveReason::Inactivity) {
            warn!("Failed to evict idle session from {code}: {error}");
        }
        true
    }

    /// Dispose a lobby whose absolute lifetime has elapsed. Remaining
    /// participants are dropped along with it.
    pub fn expire_lobby(&self, code: &str) {
        let removed = {
            let Ok(mut lobbies) = self.lobbies.write() else {
                return;
            };
            lobbies.remove(code)
        };
        let Some(mut entry) = removed else {
            return;
        };

        entry.lobby.mark_disbanded();
        for (_, timer) in entry.presence.drain() {
            timer.cancel();
        }
        // On the expiry path this aborts the already-finishing timer task;
        // everything after this point is synchronous.
        entry.expiry.abort();

        self.bump(|s| s.lobbies_disbanded += 1);
        self.metrics.record_lobby_disbanded(DisbandCause::Expired.as_str());
        self.publish_current_gauges();
        info!("Disbanded expired lobby {code}");

        self.broadcaster.broadcast(code, OutboundEvent::LobbyDisbanded);
        self.broadcaster.close_lobby(code);
    }

    /// Disband every live lobby (service shutdown)
    pub fn shutdown(&self) {
        let entries = {
            let Ok(mut lobbies) = self.lobbies.write() else {
                return;
            };
            lobbies.drain().collect::<Vec<_>>()
        };
        let count = entries.len();
        for (code, mut entry) in entries {
            entry.lobby.mark_disbanded();
            entry.expiry.abort();
            for (_, timer) in entry.presence.drain() {
                timer.cancel();
            }
            self.bump(|s| s.lobbies_disbanded += 1);
            self.metrics
                .record_lobby_disbanded(DisbandCause::Shutdown.as_str());
            self.broadcaster.broadcast(&code, OutboundEvent::LobbyDisbanded);
            self.broadcaster.close_lobby(&code);
        }
        self.publish_current_gauges();
        if count > 0 {
            info!("Disbanded {count} lobbies on shutdown");
        }
    }

    /// Whether a lobby is currently live under this code
    pub fn contains_code(&self, code: &str) -> bool {
        let normalized = normalize_code(code);
        self.lobbies
            .read()
            .map(|lobbies| lobbies.contains_key(&normalized))
            .unwrap_or(false)
    }

    /// Ordered roster of a live lobby
    pub fn roster(&self, code: &str) -> Option<Vec<RosterEntry>> {
        let normalized = normalize_code(code);
        self.lobbies
            .read()
            .ok()?
            .get(&normalized)
            .map(|entry| entry.lobby.roster())
    }

    /// Participant count of a live lobby
    pub fn participant_count(&self, code: &str) -> Option<usize> {
        let normalized = normalize_code(code);
        self.lobbies
            .read()
            .ok()?
            .get(&normalized)
            .map(|entry| entry.lobby.participant_count())
    }

    /// Counters plus live gauges
    pub fn stats(&self) -> Result<RegistryStats> {
        let counters = self
            .stats
            .read()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone();
        let lobbies = self.lobbies.read().map_err(|_| LobbyError::InternalError {
            message: "Failed to acquire lobby lock".to_string(),
        })?;
        let (active_lobbies, participants_present) = Self::gauges(&lobbies);
        Ok(RegistryStats {
            active_lobbies,
            participants_present,
            ..counters
        })
    }

    fn spawn_expiry(self: &Arc<Self>, code: LobbyCode) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let lifetime = self.settings.lifetime();
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            registry.expire_lobby(&code);
        })
    }

    fn write_lobbies(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<LobbyCode, LobbyEntry>>> {
        self.lobbies.write().map_err(|_| {
            LobbyError::InternalError {
                message: "Failed to acquire lobby lock".to_string(),
            }
            .into()
        })
    }

    fn bump<F: FnOnce(&mut RegistryStats)>(&self, update: F) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    fn gauges(lobbies: &HashMap<LobbyCode, LobbyEntry>) -> (usize, usize) {
        let participants = lobbies
            .values()
            .map(|entry| entry.lobby.participant_count())
            .sum();
        (lobbies.len(), participants)
    }

    fn publish_gauges(&self, (active, present): (usize, usize)) {
        self.metrics.set_active_lobbies(active as i64);
        self.metrics.set_participants_present(present as i64);
    }

    fn publish_current_gauges(&self) {
        if let Ok(lobbies) = self.lobbies.read() {
            let gauges = Self::gauges(&lobbies);
            self.publish_gauges(gauges);
        }
    }

    /// Backdate a participant's activity (for testing eviction windows)
    #[cfg(test)]
    pub fn backdate_activity(&self, code: &str, session_id: &str, at: chrono::DateTime<chrono::Utc>) {
        if let Ok(mut lobbies) = self.lobbies.write() {
            if let Some(entry) = lobbies.get_mut(&normalize_code(code)) {
                entry.lobby.set_last_active(session_id, at);
            }
        }
    }
}
