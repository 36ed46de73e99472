//! Presence liveness tracking
//!
//! One cancelable timer per participant, re-armed on a fixed interval for
//! the lifetime of the membership. Each tick asks the registry whether the
//! session has gone quiet; the registry performs the eviction itself so
//! the check and the removal happen under the same lock discipline as
//! every other operation.

use crate::lobby::registry::LobbyRegistry;
use crate::types::{LobbyCode, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Handle to a spawned liveness task.
///
/// Every removal path must cancel the timer before the participant record
/// is discarded, so a stale tick can never fire against deleted state.
/// Cancellation is synchronous (`JoinHandle::abort`), and dropping the
/// handle cancels as well.
#[derive(Debug)]
pub struct PresenceTimer {
    handle: JoinHandle<()>,
}

impl PresenceTimer {
    /// Spawn a liveness task for one participant.
    ///
    /// The task re-arms every `interval` and stops on its own once the
    /// registry reports the session gone (evicted or already removed).
    pub fn spawn(
        registry: Arc<LobbyRegistry>,
        code: LobbyCode,
        session_id: SessionId,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                trace!("Presence tick for session {session_id} in lobby {code}");
                if registry.evict_if_inactive(&code, &session_id) {
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Cancel the timer synchronously
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for PresenceTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
