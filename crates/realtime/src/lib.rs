//! Realtime notification connection for the Pulse dashboard.
//!
//! Provides the WebSocket endpoint/handshake client, frame processing,
//! heartbeat, exponential-backoff reconnection policy, and the
//! [`ConnectionManager`] state machine that ties them together and feeds
//! decoded envelopes into an [`EventDispatcher`](pulse_events::EventDispatcher).

pub mod client;
pub mod config;
pub mod heartbeat;
pub mod manager;
pub mod messages;
pub mod processor;
pub mod reconnect;

pub use client::{ConnectionError, NotificationClient};
pub use config::RealtimeConfig;
pub use manager::{ConnectionManager, ConnectionState};
pub use reconnect::ReconnectConfig;
