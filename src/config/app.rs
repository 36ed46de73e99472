//! Main application configuration
//!
//! This module defines the primary configuration structures for the green-room
//! lobby service, including environment variable loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub lobby: LobbySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host to bind the HTTP/WebSocket server to
    pub host: String,
    /// Port for the HTTP/WebSocket server
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Lobby lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySettings {
    /// Maximum participants per lobby
    pub max_participants: usize,
    /// Absolute lobby lifetime from creation, in seconds
    pub lifetime_seconds: u64,
    /// Inactivity window before a participant is evicted, in seconds.
    /// Also bounds the reconnection grace window.
    pub inactivity_seconds: u64,
    /// How often each participant's presence timer re-arms, in seconds
    pub presence_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "green-room".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            max_participants: 50,
            lifetime_seconds: 3600,      // 1 hour
            inactivity_seconds: 600,     // 10 minutes
            presence_interval_seconds: 30,
        }
    }
}

impl LobbySettings {
    /// Lobby lifetime as a std Duration (for timer scheduling)
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_seconds)
    }

    /// Presence timer re-arm interval
    pub fn presence_interval(&self) -> Duration {
        Duration::from_secs(self.presence_interval_seconds)
    }

    /// Inactivity window as a chrono Duration (for timestamp comparison)
    pub fn inactivity_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.inactivity_seconds as i64)
    }

    /// Lobby lifetime as a chrono Duration (for timestamp comparison)
    pub fn lifetime_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lifetime_seconds as i64)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(host) = env::var("SERVICE_HOST") {
            config.service.host = host;
        }
        if let Ok(port) = env::var("SERVICE_PORT") {
            config.service.port = port
                .parse()
                .map_err(|_| anyhow!("SERVICE_PORT must be a valid port number"))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("SHUTDOWN_TIMEOUT_SECONDS must be a number"))?;
        }

        // Lobby settings
        if let Ok(max) = env::var("LOBBY_MAX_PARTICIPANTS") {
            config.lobby.max_participants = max
                .parse()
                .map_err(|_| anyhow!("LOBBY_MAX_PARTICIPANTS must be a number"))?;
        }
        if let Ok(lifetime) = env::var("LOBBY_LIFETIME_SECONDS") {
            config.lobby.lifetime_seconds = lifetime
                .parse()
                .map_err(|_| anyhow!("LOBBY_LIFETIME_SECONDS must be a number"))?;
        }
        if let Ok(inactivity) = env::var("LOBBY_INACTIVITY_SECONDS") {
            config.lobby.inactivity_seconds = inactivity
                .parse()
                .map_err(|_| anyhow!("LOBBY_INACTIVITY_SECONDS must be a number"))?;
        }
        if let Ok(interval) = env::var("LOBBY_PRESENCE_INTERVAL_SECONDS") {
            config.lobby.presence_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("LOBBY_PRESENCE_INTERVAL_SECONDS must be a number"))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Graceful shutdown timeout
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate a loaded configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.lobby.max_participants == 0 {
        return Err(anyhow!("lobby.max_participants must be at least 1"));
    }
    if config.lobby.lifetime_seconds == 0 {
        return Err(anyhow!("lobby.lifetime_seconds must be at least 1"));
    }
    if config.lobby.inactivity_seconds == 0 {
        return Err(anyhow!("lobby.inactivity_seconds must be at least 1"));
    }
    if config.lobby.presence_interval_seconds == 0 {
        return Err(anyhow!("lobby.presence_interval_seconds must be at least 1"));
    }
    if config.lobby.inactivity_seconds > config.lobby.lifetime_seconds {
        return Err(anyhow!(
            "lobby.inactivity_seconds must not exceed lobby.lifetime_seconds"
        ));
    }
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.service.log_level.as_str()) {
        return Err(anyhow!(
            "service.log_level must be one of {:?}",
            valid_levels
        ));
    }
    Ok(())
}
