//! Service layer for the lobby service
//!
//! Application state wiring, the HTTP/WebSocket router, and health
//! reporting.

pub mod app;
pub mod health;

pub use app::{router, serve, AppState};
pub use health::{HealthCheck, HealthStatus};
