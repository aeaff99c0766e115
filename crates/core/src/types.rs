/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Server-side identifier of a background analysis job.
///
/// Job ids arrive as strings in event payloads; numeric ids are
/// normalised to their decimal representation.
pub type JobId = String;

/// WebSocket close code for a normal, client-initiated closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Application close code sent by the server when it rejects the
/// credential. A connection closed with this code is never retried.
pub const CLOSE_AUTH_REJECTED: u16 = 4001;
