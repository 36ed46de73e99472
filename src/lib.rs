//! Green Room - ephemeral code-addressed lobby service
//!
//! This crate provides short-lived chat/game lobbies addressed by
//! human-readable codes, with presence-based eviction, reconnection grace
//! windows, and WebSocket fan-out.

pub mod config;
pub mod error;
pub mod gateway;
pub mod lobby;
pub mod metrics;
pub mod presence;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LobbyError, Result};
pub use types::*;

// Re-export key components
pub use gateway::{Broadcaster, Gateway, SessionHub};
pub use lobby::{LobbyInstance, LobbyRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
