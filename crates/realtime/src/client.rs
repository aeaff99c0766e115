//! WebSocket handshake client for the notification endpoint.
//!
//! [`NotificationClient`] holds the configured API origin and WebSocket
//! path. Call [`NotificationClient::connect`] with a bearer credential to
//! establish a live [`WsStream`].

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// The raw WebSocket stream for one connection epoch.
pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Query parameter carrying the bearer credential.
const TOKEN_PARAM: &str = "token";

/// Configuration handle for the notification endpoint.
#[derive(Debug, Clone)]
pub struct NotificationClient {
    base_url: String,
    ws_path: String,
}

impl NotificationClient {
    /// * `base_url` - HTTP(S) API origin, e.g. `https://api.example.com`.
    /// * `ws_path`  - path of the notification socket, e.g. `/ws/notifications`.
    pub fn new(base_url: impl Into<String>, ws_path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ws_path: ws_path.into(),
        }
    }

    /// The configured API origin.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the WebSocket URL for `credential`.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`; the WebSocket path is
    /// appended to any path already on the origin and the credential is
    /// URL-encoded into the `token` query parameter.
    pub fn endpoint(&self, credential: &str) -> Result<Url, ConnectionError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ConnectionError::InvalidEndpoint(format!("{}: {e}", self.base_url))
        })?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConnectionError::InvalidEndpoint(format!(
                    "unsupported scheme `{other}` in {}",
                    self.base_url
                )))
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            ConnectionError::InvalidEndpoint(format!("cannot use {scheme} for {}", self.base_url))
        })?;

        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.ws_path.trim_start_matches('/')
        );
        url.set_path(&path);
        url.set_fragment(None);
        url.set_query(None);
        url.query_pairs_mut().append_pair(TOKEN_PARAM, credential);

        Ok(url)
    }

    /// Perform the WebSocket handshake.
    pub async fn connect(&self, credential: &str) -> Result<WsStream, ConnectionError> {
        let url = self.endpoint(credential)?;

        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            ConnectionError::Transport(format!(
                "Failed to connect to {}: {e}",
                self.base_url
            ))
        })?;

        tracing::info!(endpoint = %self.base_url, path = %self.ws_path, "Notification socket connected");

        Ok(ws_stream)
    }
}

/// Errors surfaced by the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The configured origin cannot be turned into a WebSocket URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The handshake failed before the connection opened.
    #[error("Connection error: {0}")]
    Transport(String),

    /// `disconnect()` (or a newer `connect()`) superseded this attempt.
    #[error("Connection attempt aborted")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn http_becomes_ws() {
        let client = NotificationClient::new("http://localhost:8000", "/ws/notifications");
        let url = client.endpoint("abc").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/notifications?token=abc");
    }

    #[test]
    fn https_becomes_wss() {
        let client = NotificationClient::new("https://api.example.com", "ws/notifications");
        let url = client.endpoint("abc").unwrap();
        assert_eq!(url.as_str(), "wss://api.example.com/ws/notifications?token=abc");
    }

    #[test]
    fn origin_path_prefix_is_kept() {
        let client = NotificationClient::new("https://api.example.com/v1/", "/ws/notifications");
        let url = client.endpoint("abc").unwrap();
        assert_eq!(url.path(), "/v1/ws/notifications");
    }

    #[test]
    fn credential_is_url_encoded() {
        let client = NotificationClient::new("http://localhost:8000", "/ws");
        let url = client.endpoint("a b&c=d/é").unwrap();
        let token: Vec<_> = url
            .query_pairs()
            .filter(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(token, vec!["a b&c=d/é".to_string()]);
        assert!(!url.query().unwrap().contains('&'));
    }

    #[test]
    fn existing_query_is_replaced() {
        let client = NotificationClient::new("http://localhost:8000/?debug=1#frag", "/ws");
        let url = client.endpoint("t").unwrap();
        assert_eq!(url.query(), Some("token=t"));
        assert!(url.fragment().is_none());
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let client = NotificationClient::new("ftp://files.example.com", "/ws");
        assert_matches!(client.endpoint("t"), Err(ConnectionError::InvalidEndpoint(_)));
    }

    #[test]
    fn unparseable_origin_is_rejected() {
        let client = NotificationClient::new("not a url", "/ws");
        assert_matches!(client.endpoint("t"), Err(ConnectionError::InvalidEndpoint(_)));
    }
}
