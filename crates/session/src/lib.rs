//! Application-facing facade over the Pulse realtime stack.
//!
//! [`RealtimeSession`] is built once at startup and shared as
//! `Arc<RealtimeSession>`. It owns the [`ConnectionManager`](pulse_realtime::ConnectionManager),
//! the notification feed and the job progress tracker, and asks a
//! [`CredentialProvider`] for the bearer credential on every `connect()`.

pub mod config;
pub mod credentials;
pub mod error;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use credentials::{CredentialProvider, StaticCredential};
pub use error::SessionError;
pub use session::RealtimeSession;
