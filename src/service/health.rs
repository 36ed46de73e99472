//! Health reporting for the lobby service

use crate::lobby::registry::RegistryStats;
use crate::service::app::AppState;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::warn;

/// Health check status
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
        }
    }
}

/// Health check response body
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: u64,
    pub stats: RegistryStats,
}

impl HealthCheck {
    /// Snapshot current service health.
    ///
    /// The only internal failure mode is a poisoned registry lock, which
    /// degrades the service rather than killing the endpoint.
    pub fn check(state: &AppState) -> Self {
        let (status, stats) = match state.registry().stats() {
            Ok(stats) => (HealthStatus::Healthy, stats),
            Err(error) => {
                warn!("Registry stats unavailable for health check: {error}");
                (HealthStatus::Degraded, RegistryStats::default())
            }
        };

        Self {
            status,
            service: state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            uptime_seconds: state.uptime().as_secs(),
            stats,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_fresh_service_is_healthy() {
        let state = AppState::new(AppConfig::default()).unwrap();
        let check = HealthCheck::check(&state);

        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.status_code(), StatusCode::OK);
        assert_eq!(check.stats.active_lobbies, 0);
        assert_eq!(check.service, "green-room");
    }

    #[tokio::test]
    async fn test_health_reflects_registry_state() {
        let state = AppState::new(AppConfig::default()).unwrap();
        state
            .registry()
            .create_lobby("s1".to_string(), "alice")
            .unwrap();

        let check = HealthCheck::check(&state);
        assert_eq!(check.stats.active_lobbies, 1);
        assert_eq!(check.stats.participants_present, 1);
    }
}
