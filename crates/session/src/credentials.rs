use async_trait::async_trait;

/// Source of the bearer credential used to open the notification socket.
///
/// Implemented by whatever owns the user's authenticated session. Returning
/// `None` means the user is not signed in and no connection is attempted.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Option<String>;
}

/// A fixed credential, e.g. read once from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(credential: impl Into<String>) -> Self {
        Self(Some(credential.into()))
    }

    /// A provider that never yields a credential.
    pub fn none() -> Self {
        Self(None)
    }
}

impl From<Option<String>> for StaticCredential {
    fn from(value: Option<String>) -> Self {
        Self(value.filter(|c| !c.is_empty()))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn credential(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_credential_yields_value() {
        assert_eq!(
            StaticCredential::new("abc").credential().await.as_deref(),
            Some("abc")
        );
        assert!(StaticCredential::none().credential().await.is_none());
    }

    #[tokio::test]
    async fn empty_string_means_no_credential() {
        let provider = StaticCredential::from(Some(String::new()));
        assert!(provider.credential().await.is_none());
    }
}
