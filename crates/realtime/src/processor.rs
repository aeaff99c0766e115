//! WebSocket frame processing for one connection epoch.
//!
//! [`process_frames`] reads frames until the socket closes, fails, or the
//! epoch is cancelled, decoding each text frame into an
//! [`EventEnvelope`](pulse_events::EventEnvelope) and dispatching it
//! synchronously, so frames are handled strictly in arrival order.
//! [`forward_outbound`] drains the outbound queue into the socket sink.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use pulse_events::{parse_envelope, EventDispatcher};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

/// Upper bound on flushing a close frame before the sink is dropped.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a reader loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The epoch's cancellation token fired (explicit disconnect or
    /// superseding connect).
    Cancelled,
    /// The peer closed the socket, or the stream ended.
    Closed { code: Option<u16>, reason: String },
    /// A receive error broke the connection.
    Failed(String),
}

/// Process inbound frames until the connection ends.
pub async fn process_frames<S>(
    mut stream: S,
    dispatcher: &EventDispatcher,
    epoch: u64,
    cancel: &CancellationToken,
) -> SessionEnd
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                handle_text_frame(&text, dispatcher, epoch);
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!(epoch, "Ignoring binary frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(epoch, ?frame, "Notification socket closed by server");
                return match frame {
                    Some(frame) => SessionEnd::Closed {
                        code: Some(u16::from(frame.code)),
                        reason: frame.reason.into_owned(),
                    },
                    None => SessionEnd::Closed {
                        code: None,
                        reason: String::new(),
                    },
                };
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::error!(epoch, error = %e, "WebSocket receive error");
                return SessionEnd::Failed(e.to_string());
            }
            None => {
                tracing::info!(epoch, "WebSocket stream exhausted");
                return SessionEnd::Closed {
                    code: None,
                    reason: "stream ended".into(),
                };
            }
        }
    }
}

/// Decode one text frame and dispatch it.
///
/// Malformed frames are logged and dropped; the connection is unaffected.
pub fn handle_text_frame(text: &str, dispatcher: &EventDispatcher, epoch: u64) {
    match parse_envelope(text) {
        Ok(envelope) if envelope.event_type.is_heartbeat_reply() => {
            tracing::trace!(epoch, event_type = %envelope.event_type, "Heartbeat acknowledged");
        }
        Ok(envelope) => {
            tracing::debug!(epoch, event_type = %envelope.event_type, "Notification frame received");
            dispatcher.dispatch(&envelope);
        }
        Err(e) => {
            tracing::warn!(
                epoch,
                error = %e,
                raw_message = %text,
                "Failed to parse notification frame",
            );
        }
    }
}

/// Send queued frames until every sender is dropped or a close frame has
/// been written, then close the sink.
pub async fn forward_outbound<S>(mut sink: S, mut outbound: mpsc::UnboundedReceiver<Message>, epoch: u64)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            tracing::debug!(epoch, error = %e, "Outbound send failed");
            break;
        }
        if closing {
            break;
        }
    }

    if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, sink.close())
        .await
        .is_err()
    {
        tracing::debug!(epoch, "Timed out closing notification socket");
    }
}
