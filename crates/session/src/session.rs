use std::sync::{Arc, Once};

use pulse_notifications::{NotificationStore, ProgressTracker};
use pulse_realtime::{ConnectionManager, ConnectionState};

use crate::config::SessionConfig;
use crate::credentials::CredentialProvider;
use crate::error::SessionError;

/// One user's realtime session: connection, notification feed and job
/// progress bound together.
pub struct RealtimeSession {
    manager: Arc<ConnectionManager>,
    notifications: Arc<NotificationStore>,
    progress: Arc<ProgressTracker>,
    credentials: Arc<dyn CredentialProvider>,
    attach: Once,
}

impl RealtimeSession {
    pub fn new(config: SessionConfig, credentials: Arc<dyn CredentialProvider>) -> Arc<Self> {
        let progress = Arc::new(ProgressTracker::new());
        let notifications = Arc::new(NotificationStore::new(
            config.feed_capacity,
            Arc::clone(&progress),
        ));

        Arc::new(Self {
            manager: ConnectionManager::new(config.realtime),
            notifications,
            progress,
            credentials,
            attach: Once::new(),
        })
    }

    /// Open the notification connection.
    ///
    /// Returns `Ok(())` without connecting when the provider has no
    /// credential. The feed and progress handlers are registered on the
    /// first call only, so repeated connects never duplicate records.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let Some(credential) = self.credentials.credential().await else {
            tracing::debug!("No credential available, skipping notification connect");
            return Ok(());
        };

        self.attach.call_once(|| {
            let dispatcher = self.manager.dispatcher();
            self.progress.attach(dispatcher);
            self.notifications.attach(dispatcher);
            tracing::debug!("Notification handlers attached");
        });

        self.manager.connect(&credential).await?;
        Ok(())
    }

    /// Close the connection. Handlers stay registered for the next
    /// `connect()`.
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredential;

    #[tokio::test]
    async fn connect_without_credential_is_a_noop() {
        let session = RealtimeSession::new(
            SessionConfig::default(),
            Arc::new(StaticCredential::none()),
        );

        session.connect().await.unwrap();

        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(!session.is_connected());
        assert_eq!(session.manager().dispatcher().handler_count(), 0);
    }

    #[tokio::test]
    async fn invalid_endpoint_is_returned_to_caller() {
        let mut config = SessionConfig::default();
        config.realtime.base_url = "ftp://files.example.com".into();
        let session = RealtimeSession::new(config, Arc::new(StaticCredential::new("t")));

        let result = session.connect().await;

        assert!(matches!(result, Err(SessionError::Connection(_))));
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(!session.manager().has_pending_reconnect());
    }

    #[tokio::test]
    async fn handlers_attach_once_across_connects() {
        let mut config = SessionConfig::default();
        config.realtime.base_url = "ftp://files.example.com".into();
        let session = RealtimeSession::new(config, Arc::new(StaticCredential::new("t")));

        let _ = session.connect().await;
        let after_first = session.manager().dispatcher().handler_count();
        let _ = session.connect().await;

        assert!(after_first > 0);
        assert_eq!(session.manager().dispatcher().handler_count(), after_first);
    }
}
