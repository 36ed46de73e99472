//! Error types for the lobby service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific lobby scenarios
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby is full: {code}")]
    LobbyFull { code: String },

    #[error("Invalid lobby code: {code}")]
    InvalidCode { code: String },

    #[error("Reconnect failed: {reason}")]
    ReconnectFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
