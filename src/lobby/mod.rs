//! Lobby management for the lobby service
//!
//! This module contains code generation, the lobby instances themselves,
//! and the registry that owns every live lobby and its timers.

pub mod codes;
pub mod instance;
pub mod registry;

pub use codes::{generate_code, generate_unique_code};
pub use instance::{LobbyInstance, LobbyState};
pub use registry::{DisbandCause, LobbyRegistry, RegistryStats};
