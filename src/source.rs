use crate::error::{AuthError, FetchError};

/// Body of the usage report page, as returned by the portal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument(String);

impl RawDocument {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RawDocument {
    fn from(body: String) -> Self {
        Self(body)
    }
}

/// Trait for portals that yield the usage page behind a login
#[async_trait::async_trait]
pub trait UsagePortal: Send + Sync + 'static {
    /// Session artifact produced by a successful login
    type Session: Send + Sync;

    /// Authenticate and return a fresh session
    async fn login(&self) -> Result<Self::Session, AuthError>;

    /// Fetch the usage page with a session from `login`
    async fn fetch_usage_page(&self, session: &Self::Session) -> Result<RawDocument, FetchError>;

    /// Get the portal name
    fn name(&self) -> &str;
}
