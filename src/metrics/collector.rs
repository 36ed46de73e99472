//! Metrics collection using Prometheus
//!
//! Counters and gauges for lobby lifecycle, participant churn, and message
//! traffic. Each collector owns its own registry so independent instances
//! (and tests) never collide on metric names.

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Main metrics collector for the lobby service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Lobby lifecycle metrics
    lobby_metrics: LobbyMetrics,

    /// Participant and message metrics
    participant_metrics: ParticipantMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Currently connected WebSocket sessions
    pub connected_sessions: IntGauge,
}

/// Lobby lifecycle metrics
#[derive(Clone)]
pub struct LobbyMetrics {
    /// Number of currently live lobbies
    pub active_lobbies: IntGauge,

    /// Total lobbies created
    pub lobbies_created_total: IntCounter,

    /// Total lobbies disbanded, by cause
    pub lobbies_disbanded_total: IntCounterVec,
}

/// Participant and message metrics
#[derive(Clone)]
pub struct ParticipantMetrics {
    /// Participants currently seated across all lobbies
    pub participants_present: IntGauge,

    /// Total participants seated
    pub participants_joined_total: IntCounter,

    /// Total participants removed, by reason
    pub participants_left_total: IntCounterVec,

    /// Total successful reconnects
    pub reconnects_total: IntCounter,

    /// Total chat messages relayed
    pub chat_messages_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with a custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let lobby_metrics = LobbyMetrics::new(&registry)?;
        let participant_metrics = ParticipantMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            lobby_metrics,
            participant_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get lobby metrics
    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    /// Get participant metrics
    pub fn participant(&self) -> &ParticipantMetrics {
        &self.participant_metrics
    }

    /// Render the current metric families in text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_lobby_created(&self) {
        self.lobby_metrics.lobbies_created_total.inc();
    }

    pub fn record_lobby_disbanded(&self, cause: &str) {
        self.lobby_metrics
            .lobbies_disbanded_total
            .with_label_values(&[cause])
            .inc();
    }

    pub fn record_participant_joined(&self) {
        self.participant_metrics.participants_joined_total.inc();
    }

    pub fn record_participant_left(&self, reason: &str) {
        self.participant_metrics
            .participants_left_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_reconnect(&self) {
        self.participant_metrics.reconnects_total.inc();
    }

    pub fn record_chat_message(&self) {
        self.participant_metrics.chat_messages_total.inc();
    }

    pub fn set_active_lobbies(&self, count: i64) {
        self.lobby_metrics.active_lobbies.set(count);
    }

    pub fn set_participants_present(&self, count: i64) {
        self.participant_metrics.participants_present.set(count);
    }

    pub fn set_connected_sessions(&self, count: i64) {
        self.service_metrics.connected_sessions.set(count);
    }

    pub fn set_uptime_seconds(&self, seconds: i64) {
        self.service_metrics.uptime_seconds.set(seconds);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("green_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let connected_sessions = IntGauge::new(
            "green_room_connected_sessions",
            "Currently connected WebSocket sessions",
        )?;
        registry.register(Box::new(connected_sessions.clone()))?;

        Ok(Self {
            uptime_seconds,
            connected_sessions,
        })
    }
}

impl LobbyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_lobbies =
            IntGauge::new("green_room_active_lobbies", "Number of live lobbies")?;
        registry.register(Box::new(active_lobbies.clone()))?;

        let lobbies_created_total =
            IntCounter::new("green_room_lobbies_created_total", "Total lobbies created")?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        let lobbies_disbanded_total = IntCounterVec::new(
            Opts::new(
                "green_room_lobbies_disbanded_total",
                "Total lobbies disbanded",
            ),
            &["cause"],
        )?;
        registry.register(Box::new(lobbies_disbanded_total.clone()))?;

        Ok(Self {
            active_lobbies,
            lobbies_created_total,
            lobbies_disbanded_total,
        })
    }
}

impl ParticipantMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let participants_present = IntGauge::new(
            "green_room_participants_present",
            "Participants currently seated across all lobbies",
        )?;
        registry.register(Box::new(participants_present.clone()))?;

        let participants_joined_total = IntCounter::new(
            "green_room_participants_joined_total",
            "Total participants seated",
        )?;
        registry.register(Box::new(participants_joined_total.clone()))?;

        let participants_left_total = IntCounterVec::new(
            Opts::new(
                "green_room_participants_left_total",
                "Total participants removed",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(participants_left_total.clone()))?;

        let reconnects_total = IntCounter::new(
            "green_room_reconnects_total",
            "Total successful session reconnects",
        )?;
        registry.register(Box::new(reconnects_total.clone()))?;

        let chat_messages_total = IntCounter::new(
            "green_room_chat_messages_total",
            "Total chat messages relayed",
        )?;
        registry.register(Box::new(chat_messages_total.clone()))?;

        Ok(Self {
            participants_present,
            participants_joined_total,
            participants_left_total,
            reconnects_total,
            chat_messages_total,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
