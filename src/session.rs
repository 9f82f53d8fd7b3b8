//! Portal session client
//!
//! Logs in with form credentials and fetches the usage page with the cookies
//! the login response set. Sessions are never cached here; the caller owns
//! each [`SessionState`] and passes it back explicitly.

use std::fmt;
use std::time::Duration;

use log::{debug, error};
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::error::{AgentError, AuthError, FetchError};
use crate::source::{RawDocument, UsagePortal};

/// Default portal login form target
pub const DEFAULT_LOGIN_URL: &str = "https://pec.smarthub.coop/Login.html";

/// Default usage report page
pub const DEFAULT_USAGE_URL: &str = "https://pec.smarthub.coop/Usage/Usage.htm";

/// Browser-like user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Portal login credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The two portal endpoints a collector talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login_url: String,
    pub usage_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            usage_url: DEFAULT_USAGE_URL.to_string(),
        }
    }
}

/// Transport options for the session client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout applied to each request, body included
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Cookies captured from a successful login
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    cookies: Vec<(String, String)>,
}

impl SessionState {
    pub fn from_cookies<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn cookie_names(&self) -> impl Iterator<Item = &str> {
        self.cookies.iter().map(|(name, _)| name.as_str())
    }

    /// Value for a `Cookie` request header, if any cookies were set
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// Cookie values are credentials in their own right.
impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("cookies", &self.cookie_names().collect::<Vec<_>>())
            .finish()
    }
}

/// HTTP client bound to one credential set and one pair of endpoints
pub struct SessionClient {
    http: Client,
    credentials: Credentials,
    endpoints: Endpoints,
    user_agent: String,
}

impl SessionClient {
    /// Create a new session client
    pub fn new(
        credentials: Credentials,
        endpoints: Endpoints,
        options: ClientOptions,
    ) -> Result<Self, AgentError> {
        // Redirects stay unfollowed so a bounced login is visible as a 3xx.
        let http = Client::builder()
            .timeout(options.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| AgentError::Http(e.to_string()))?;

        Ok(Self {
            http,
            credentials,
            endpoints,
            user_agent: options.user_agent,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Submit the login form and capture the session cookies
    pub async fn login(&self) -> Result<SessionState, AuthError> {
        let payload = [
            ("UserName", self.credentials.username.as_str()),
            ("Password", self.credentials.password.as_str()),
        ];

        let response = self
            .http
            .post(&self.endpoints.login_url)
            .header(USER_AGENT, &self.user_agent)
            .form(&payload)
            .send()
            .await
            .map_err(AuthError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            error!("Failed to log in to {}: {}", self.endpoints.login_url, status);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let session = SessionState::from_cookies(
            response
                .cookies()
                .map(|c| (c.name().to_string(), c.value().to_string())),
        );
        debug!(
            "Logged in to {} ({} session cookies)",
            self.endpoints.login_url,
            session.cookies.len()
        );

        Ok(session)
    }

    /// Fetch the usage report page with an authenticated session
    pub async fn fetch_usage_page(&self, session: &SessionState) -> Result<RawDocument, FetchError> {
        let mut request = self
            .http
            .get(&self.endpoints.usage_url)
            .header(USER_AGENT, &self.user_agent);

        if let Some(cookie) = session.cookie_header() {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(FetchError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            error!("Failed to fetch usage data from {}: {}", self.endpoints.usage_url, status);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(FetchError::from_transport)?;
        debug!("Fetched usage page ({} bytes)", body.len());

        Ok(RawDocument::from(body))
    }
}

#[async_trait::async_trait]
impl UsagePortal for SessionClient {
    type Session = SessionState;

    async fn login(&self) -> Result<SessionState, AuthError> {
        SessionClient::login(self).await
    }

    async fn fetch_usage_page(&self, session: &SessionState) -> Result<RawDocument, FetchError> {
        SessionClient::fetch_usage_page(self, session).await
    }

    fn name(&self) -> &str {
        &self.endpoints.login_url
    }
}
