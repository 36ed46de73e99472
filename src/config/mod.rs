//! Configuration management for the green-room service
//!
//! This module handles all configuration loading from environment variables,
//! TOML files, validation, and default values for the lobby service.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, LobbySettings, ServiceSettings};
