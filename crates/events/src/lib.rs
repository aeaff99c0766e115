//! Pulse event envelope and in-process dispatcher.
//!
//! - [`EventEnvelope`] -- one decoded notification frame.
//! - [`EventDispatcher`] -- typed publish/subscribe registry with
//!   per-handler panic isolation. It knows nothing about the network;
//!   the realtime connection feeds it decoded envelopes.

pub mod dispatcher;
pub mod envelope;

pub use dispatcher::{EventDispatcher, EventFilter, Handler, Subscription};
pub use envelope::{parse_envelope, EventEnvelope};
