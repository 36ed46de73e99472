//! Utility functions for the lobby service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique transport-session identifier
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Normalize a lobby code for case-insensitive comparison
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}
