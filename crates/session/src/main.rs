//! `pulse-listen` -- tail the Pulse notification stream from a terminal.
//!
//! Connects with a bearer token, logs every feed and progress change, and
//! disconnects cleanly on Ctrl-C.
//!
//! # Environment variables
//!
//! | Variable      | Required | Default | Description                         |
//! |---------------|----------|---------|-------------------------------------|
//! | `PULSE_TOKEN` | yes      | --      | Bearer credential for the socket    |
//!
//! All `PULSE_*` settings read by `SessionConfig::from_env` apply as well.

use std::sync::Arc;

use anyhow::Context;
use pulse_session::{RealtimeSession, SessionConfig, StaticCredential};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_session=info,pulse_realtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SessionConfig::from_env().context("Invalid PULSE_* configuration")?;
    let token = std::env::var("PULSE_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .context("PULSE_TOKEN environment variable is required")?;

    tracing::info!(
        api_url = %config.realtime.base_url,
        ws_path = %config.realtime.ws_path,
        feed_capacity = config.feed_capacity,
        "Starting pulse-listen",
    );

    let session = RealtimeSession::new(config, Arc::new(StaticCredential::new(token)));
    let mut feed = session.notifications().subscribe();
    let mut progress = session.progress().subscribe();
    let mut state = session.manager().state_changes();

    session
        .connect()
        .await
        .context("Failed to open notification connection")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, disconnecting");
                break;
            }
            Ok(()) = feed.changed() => {
                let snapshot = feed.borrow_and_update().clone();
                if let Some(latest) = snapshot.iter().next() {
                    tracing::info!(
                        id = %latest.id,
                        event_type = %latest.event_type,
                        severity = ?latest.severity,
                        title = %latest.title,
                        message = %latest.message,
                        action_url = latest.action_url.as_deref().unwrap_or("-"),
                        unread = snapshot.unread_count(),
                        "Feed updated",
                    );
                } else {
                    tracing::info!("Feed cleared");
                };
            }
            Ok(()) = progress.changed() => {
                let jobs = progress.borrow_and_update().clone();
                for record in jobs.values() {
                    tracing::info!(
                        job_id = %record.job_id,
                        progress = record.progress,
                        status = %record.status,
                        "Job progress",
                    );
                }
            }
            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                tracing::info!(state = ?current, "Connection state");
            }
        }
    }

    session.disconnect();

    // Give the writer a moment to flush the close frame.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while session.connection_state() != pulse_realtime::ConnectionState::Disconnected {
            if state.changed().await.is_err() {
                break;
            }
        }
    })
    .await;

    Ok(())
}
