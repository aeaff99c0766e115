use pulse_realtime::ConnectionError;

/// Errors returned by [`RealtimeSession`](crate::RealtimeSession).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
