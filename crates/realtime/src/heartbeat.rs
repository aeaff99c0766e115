use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Spawn a task that calls `ping` every `period` until `cancel` fires.
///
/// The first ping goes out one full period after the call. The heartbeat
/// keeps intermediaries from idling the socket; it does not check for
/// the matching `pong`.
pub fn start_heartbeat<F>(
    period: Duration,
    cancel: CancellationToken,
    ping: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    tracing::debug!("Notification socket heartbeat ping");
                    ping();
                }
            }
        }
    })
}
