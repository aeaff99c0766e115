use std::time::Duration;

use crate::reconnect::ReconnectConfig;

/// Default API origin for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default path of the notification socket on the API origin.
pub const DEFAULT_WS_PATH: &str = "/ws/notifications";

/// Default interval between heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default upper bound on one TCP + WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for one [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// HTTP(S) API origin; rewritten to `ws(s)://` for the socket.
    pub base_url: String,
    /// Path of the notification socket.
    pub ws_path: String,
    /// Interval between `ping` frames while the connection is open.
    pub heartbeat_interval: Duration,
    /// A handshake still pending after this long fails with
    /// [`ConnectionError::Transport`](crate::ConnectionError::Transport).
    pub handshake_timeout: Duration,
    /// Backoff policy for unexpected closures.
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            ws_path: DEFAULT_WS_PATH.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl RealtimeConfig {
    /// Defaults pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}
