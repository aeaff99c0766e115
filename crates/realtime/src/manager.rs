//! Reconnecting, heartbeating notification connection.
//!
//! [`ConnectionManager`] owns the WebSocket session and its state
//! machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --[open]--> Open --[closed]--> Disconnected (+ retry)
//! Open | Connecting --disconnect()--> Closing --> Disconnected
//! ```
//!
//! Each open connection is an *epoch* with three tasks: a reader that
//! decodes frames into the owned [`EventDispatcher`], a writer that drains
//! the outbound queue, and the heartbeat. Every connect attempt bumps the
//! epoch number; callbacks from a stale epoch are ignored.
//!
//! Unexpected closures schedule a retry using the
//! [`ReconnectConfig`](crate::ReconnectConfig) backoff unless the server
//! closed with [`CLOSE_AUTH_REJECTED`] or the retry budget is spent.
//! Connection errors reach observers as locally dispatched `error`
//! envelopes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use pulse_core::types::{CLOSE_AUTH_REJECTED, CLOSE_NORMAL};
use pulse_core::event_types::ERROR_SOURCE_CONNECTION;
use pulse_core::EventType;
use pulse_events::{EventDispatcher, EventEnvelope};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{ConnectionError, NotificationClient, WsStream};
use crate::config::RealtimeConfig;
use crate::heartbeat::start_heartbeat;
use crate::messages::{close_message, ClientMessage};
use crate::processor::{forward_outbound, process_frames, SessionEnd};

/// Lifecycle state of the notification connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Manages the single notification connection of a client session.
///
/// Created once via [`ConnectionManager::new`]; the returned `Arc` is
/// cheap to clone into UI handles.
pub struct ConnectionManager {
    client: NotificationClient,
    config: RealtimeConfig,
    dispatcher: Arc<EventDispatcher>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Mutable bookkeeping. The lock is never held across an `.await` or
/// while handlers run.
struct Inner {
    state: ConnectionState,
    /// Incremented on every connect attempt.
    epoch: u64,
    credential: Option<String>,
    /// Cleared by `disconnect()`, terminal closures, and an exhausted
    /// retry budget; set again by `connect()`.
    auto_reconnect: bool,
    /// Retries scheduled since the last successful open.
    attempts: u32,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    /// Aborts the handshake of the current epoch while `Connecting`.
    attempt_cancel: Option<CancellationToken>,
    /// Stops the reader and heartbeat of the current epoch.
    session_cancel: Option<CancellationToken>,
    /// Pending reconnect timer, if any.
    reconnect_timer: Option<CancellationToken>,
}

impl ConnectionManager {
    /// Create a disconnected manager with its own dispatcher.
    pub fn new(config: RealtimeConfig) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            client: NotificationClient::new(config.base_url.clone(), config.ws_path.clone()),
            config,
            dispatcher: Arc::new(EventDispatcher::new()),
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                epoch: 0,
                credential: None,
                auto_reconnect: false,
                attempts: 0,
                outbound: None,
                attempt_cancel: None,
                session_cancel: None,
                reconnect_timer: None,
            }),
            state_tx,
        })
    }

    /// The dispatcher fed by this connection.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Observe state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Whether a reconnect timer is currently pending.
    pub fn has_pending_reconnect(&self) -> bool {
        self.lock().reconnect_timer.is_some()
    }

    /// Retries scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.lock().attempts
    }

    /// Open the connection with `credential`.
    ///
    /// Resolves once the socket is open. A failure here is returned to the
    /// caller and does not schedule a retry. Any existing connection is
    /// closed first.
    pub async fn connect(self: &Arc<Self>, credential: &str) -> Result<(), ConnectionError> {
        let (epoch, cancel) = {
            let mut inner = self.lock();
            inner.credential = Some(credential.to_string());
            inner.auto_reconnect = true;
            inner.attempts = 0;
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.cancel();
            }
            if let Some(tx) = inner.outbound.take() {
                tracing::info!(epoch = inner.epoch, "Replacing open notification socket");
                let _ = tx.send(close_message(CLOSE_NORMAL, "reconnecting"));
            }
            if let Some(cancel) = inner.session_cancel.take() {
                cancel.cancel();
            }
            self.begin_attempt(&mut inner)
        };

        self.open(epoch, cancel, credential).await
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Cancels the heartbeat and any pending reconnect timer and sends a
    /// normal-closure frame. Safe to call in any state, any number of
    /// times.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        inner.auto_reconnect = false;

        if let Some(timer) = inner.reconnect_timer.take() {
            timer.cancel();
        }
        if let Some(cancel) = inner.attempt_cancel.take() {
            cancel.cancel();
        }
        if let Some(cancel) = inner.session_cancel.take() {
            cancel.cancel();
        }

        match inner.state {
            ConnectionState::Open => {
                let queued = inner
                    .outbound
                    .take()
                    .is_some_and(|tx| tx.send(close_message(CLOSE_NORMAL, "client disconnect")).is_ok());
                // The writer moves us to Disconnected once the close frame
                // is flushed; if it is already gone there is nothing to wait for.
                let next = if queued {
                    ConnectionState::Closing
                } else {
                    ConnectionState::Disconnected
                };
                self.set_state(&mut inner, next);
            }
            // The cancelled handshake completes the move to Disconnected.
            ConnectionState::Connecting => {
                self.set_state(&mut inner, ConnectionState::Closing);
            }
            ConnectionState::Closing | ConnectionState::Disconnected => {}
        }

        tracing::info!(epoch = inner.epoch, state = ?inner.state, "Notification socket disconnect requested");
    }

    /// Serialize and send `message` if the connection is open.
    ///
    /// Returns whether the frame was queued. When the connection is not
    /// open the message is dropped with a warning.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialise outbound message");
                return false;
            }
        };

        let inner = self.lock();
        match inner.outbound.as_ref() {
            Some(tx) if inner.state == ConnectionState::Open => tx.send(Message::Text(json)).is_ok(),
            _ => {
                tracing::warn!(state = ?inner.state, "Notification socket not open, dropping message");
                false
            }
        }
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        if inner.state != state {
            tracing::debug!(epoch = inner.epoch, from = ?inner.state, to = ?state, "Connection state change");
            inner.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// Start a new epoch in the `Connecting` state, aborting any handshake
    /// still pending for the previous one.
    fn begin_attempt(&self, inner: &mut Inner) -> (u64, CancellationToken) {
        if let Some(previous) = inner.attempt_cancel.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        inner.attempt_cancel = Some(cancel.clone());
        inner.epoch += 1;
        self.set_state(inner, ConnectionState::Connecting);
        (inner.epoch, cancel)
    }

    /// Perform the handshake for `epoch` and start the session tasks.
    ///
    /// The handshake is abandoned when `cancel` fires and fails with
    /// [`ConnectionError::Transport`] after `handshake_timeout`.
    async fn open(
        self: &Arc<Self>,
        epoch: u64,
        cancel: CancellationToken,
        credential: &str,
    ) -> Result<(), ConnectionError> {
        let timeout = self.config.handshake_timeout;
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ConnectionError::Aborted),
            result = tokio::time::timeout(timeout, self.client.connect(credential)) => {
                result.unwrap_or_else(|_| {
                    Err(ConnectionError::Transport(format!(
                        "Handshake timed out after {}ms",
                        timeout.as_millis()
                    )))
                })
            }
        };

        let mut inner = self.lock();
        if inner.epoch == epoch {
            inner.attempt_cancel = None;
        }
        if inner.epoch != epoch || inner.state != ConnectionState::Connecting {
            if inner.epoch == epoch && inner.state == ConnectionState::Closing {
                self.set_state(&mut inner, ConnectionState::Disconnected);
            }
            drop(inner);

            tracing::info!(epoch, "Connection attempt superseded");
            if let Ok(mut ws) = result {
                tokio::spawn(async move {
                    let _ = ws.close(None).await;
                });
            }
            return Err(ConnectionError::Aborted);
        }

        match result {
            Ok(ws) => {
                self.start_session(&mut inner, epoch, ws);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(epoch, error = %e, "Notification socket handshake failed");
                self.set_state(&mut inner, ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    fn start_session(self: &Arc<Self>, inner: &mut Inner, epoch: u64, ws: WsStream) {
        let (sink, stream) = ws.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        inner.outbound = Some(tx);
        inner.session_cancel = Some(cancel.clone());
        inner.attempts = 0;
        self.set_state(inner, ConnectionState::Open);

        let writer = Arc::clone(self);
        tokio::spawn(async move {
            forward_outbound(sink, rx, epoch).await;
            writer.finish_close(epoch);
        });

        let reader = Arc::clone(self);
        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            let end = process_frames(stream, &reader.dispatcher, epoch, &reader_cancel).await;
            if end != SessionEnd::Cancelled {
                reader.handle_closed(epoch, end);
            }
        });

        let weak = Arc::downgrade(self);
        start_heartbeat(self.config.heartbeat_interval, cancel, move || {
            if let Some(manager) = weak.upgrade() {
                manager.send(&ClientMessage::Ping);
            }
        });

        tracing::info!(epoch, "Notification socket open");
    }

    /// Writer exit: completes an explicit disconnect.
    fn finish_close(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.epoch == epoch && inner.state == ConnectionState::Closing {
            self.set_state(&mut inner, ConnectionState::Disconnected);
        }
    }

    /// Reader exit or failed retry: apply the reconnect policy.
    fn handle_closed(self: &Arc<Self>, epoch: u64, end: SessionEnd) {
        let error = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                tracing::trace!(epoch, current = inner.epoch, "Ignoring closure from stale epoch");
                return;
            }

            if let Some(cancel) = inner.session_cancel.take() {
                cancel.cancel();
            }
            inner.outbound = None;

            if inner.state == ConnectionState::Closing {
                self.set_state(&mut inner, ConnectionState::Disconnected);
                return;
            }
            self.set_state(&mut inner, ConnectionState::Disconnected);

            match end {
                SessionEnd::Closed {
                    code: Some(CLOSE_AUTH_REJECTED),
                    ..
                } => {
                    tracing::warn!(epoch, "Server rejected credential, not reconnecting");
                    inner.auto_reconnect = false;
                    Some("Authentication rejected by notification server".to_string())
                }
                SessionEnd::Failed(reason) => {
                    let retry_error = self.schedule_reconnect(&mut inner);
                    retry_error.or(Some(format!("Connection error: {reason}")))
                }
                SessionEnd::Closed { code, reason } => {
                    tracing::info!(epoch, ?code, reason = %reason, "Notification socket closed");
                    self.schedule_reconnect(&mut inner)
                }
                SessionEnd::Cancelled => None,
            }
        };

        if let Some(message) = error {
            self.report_error(&message);
        }
    }

    /// Arm the reconnect timer for the next attempt.
    ///
    /// Returns an error message when the retry budget is exhausted.
    fn schedule_reconnect(self: &Arc<Self>, inner: &mut Inner) -> Option<String> {
        if !inner.auto_reconnect {
            return None;
        }

        let attempt = inner.attempts + 1;
        if !self.config.reconnect.allows(attempt) {
            tracing::warn!(
                attempts = inner.attempts,
                "Reconnect budget exhausted, giving up until next connect()",
            );
            inner.auto_reconnect = false;
            return Some(format!(
                "Unable to reconnect after {} attempts",
                inner.attempts
            ));
        }

        inner.attempts = attempt;
        let delay = self.config.reconnect.delay_for(attempt);

        if let Some(previous) = inner.reconnect_timer.take() {
            previous.cancel();
        }
        let timer = CancellationToken::new();
        inner.reconnect_timer = Some(timer.clone());

        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling notification socket reconnect",
        );

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => manager.reconnect(timer).await,
            }
        });

        None
    }

    /// Timer-driven retry.
    async fn reconnect(self: Arc<Self>, timer: CancellationToken) {
        let (epoch, cancel, credential) = {
            let mut inner = self.lock();
            if timer.is_cancelled() {
                return;
            }
            inner.reconnect_timer = None;
            if !inner.auto_reconnect || inner.state != ConnectionState::Disconnected {
                return;
            }
            let Some(credential) = inner.credential.clone() else {
                return;
            };
            let (epoch, cancel) = self.begin_attempt(&mut inner);
            (epoch, cancel, credential)
        };

        tracing::info!(epoch, "Reconnecting notification socket");
        match self.open(epoch, cancel, &credential).await {
            Ok(()) => tracing::info!(epoch, "Notification socket reconnected"),
            Err(ConnectionError::Aborted) => {}
            Err(ConnectionError::Transport(reason)) => {
                self.handle_closed(epoch, SessionEnd::Failed(reason))
            }
            Err(e) => self.handle_closed(epoch, SessionEnd::Failed(e.to_string())),
        }
    }

    /// Surface a connection error to subscribers of the `error` channel,
    /// tagged with `source: "connection"`.
    fn report_error(&self, message: &str) {
        let envelope = EventEnvelope::new(EventType::Error).with_payload(serde_json::json!({
            "message": message,
            "source": ERROR_SOURCE_CONNECTION,
        }));
        self.dispatcher.dispatch(&envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use assert_matches::assert_matches;

    fn manager_for(base_url: &str) -> Arc<ConnectionManager> {
        ConnectionManager::new(RealtimeConfig {
            reconnect: crate::ReconnectConfig {
                base_interval: Duration::from_millis(10),
                ..Default::default()
            },
            ..RealtimeConfig::with_base_url(base_url)
        })
    }

    #[test]
    fn starts_disconnected() {
        let manager = manager_for("http://localhost:1");
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_connected());
        assert!(!manager.has_pending_reconnect());
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let manager = manager_for("http://localhost:1");
        assert!(!manager.send(&ClientMessage::Ping));
        assert!(!manager.send(&serde_json::json!({"type": "subscribe"})));
    }

    #[test]
    fn disconnect_is_idempotent_when_idle() {
        let manager = manager_for("http://localhost:1");
        manager.disconnect();
        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn invalid_endpoint_fails_without_retry() {
        let manager = manager_for("mailto:nobody@example.com");
        let result = manager.connect("token").await;

        assert_matches!(result, Err(ConnectionError::InvalidEndpoint(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.has_pending_reconnect());
    }

    #[tokio::test]
    async fn refused_handshake_fails_without_retry() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let manager = manager_for(&format!("http://{addr}"));
        let result = manager.connect("token").await;

        assert_matches!(result, Err(ConnectionError::Transport(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.has_pending_reconnect());
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn state_changes_are_observable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let manager = manager_for(&format!("http://{addr}"));
        let mut rx = manager.state_changes();
        let _ = manager.connect("token").await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);
    }
}
