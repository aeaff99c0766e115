//! Shared vocabulary for the Pulse realtime client.
//!
//! Everything here is plain data: the event-type tags that travel over
//! the notification WebSocket, the reserved close codes, and common type
//! aliases. No crate in the workspace depends on anything lower than this.

pub mod event_types;
pub mod types;

pub use event_types::EventType;
