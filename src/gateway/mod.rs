//! Connection gateway for the lobby service
//!
//! Wire events, the broadcast hub, the event dispatcher, and the
//! WebSocket transport that ties them to live connections.

pub mod events;
pub mod handler;
pub mod hub;
pub mod ws;

pub use events::{InboundEvent, OutboundEvent};
pub use handler::{ConnectionState, Gateway};
pub use hub::{Broadcaster, RecordingBroadcaster, SessionHub};
