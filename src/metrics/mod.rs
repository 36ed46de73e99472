//! Prometheus metrics for the lobby service

pub mod collector;

pub use collector::{LobbyMetrics, MetricsCollector, ParticipantMetrics, ServiceMetrics};
