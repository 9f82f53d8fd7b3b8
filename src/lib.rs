//! A polling collector for electric usage readings scraped from a utility portal

pub mod collector;
pub mod config;
pub mod error;
pub mod extract;
pub mod report;
pub mod schedule;
pub mod session;
pub mod source;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

use crate::collector::UsageCollector;
use crate::error::AgentError;
use crate::extract::UsageExtractor;
use crate::session::SessionClient;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::collector::{CollectorState, UsageCollector, UsageReading};
    pub use crate::config::{AppConfig, LogLevel, load_app_config};
    pub use crate::error::{AgentError, AuthError, CollectorError, FetchError, ParseError, Result};
    pub use crate::extract::UsageExtractor;
    pub use crate::report::UsageReport;
    pub use crate::schedule::Poller;
    pub use crate::session::{Credentials, Endpoints, SessionClient, SessionState};
    pub use crate::source::{RawDocument, UsagePortal};
}

/// Build a collector backed by the portal session client
pub fn build_collector(
    config: &crate::config::AppConfig,
) -> std::result::Result<UsageCollector<SessionClient>, AgentError> {
    let client = SessionClient::new(
        config.credentials(),
        config.endpoints(),
        config.client_options(),
    )?;
    let extractor = UsageExtractor::new(&config.usage_selector)?;

    Ok(UsageCollector::new(&config.name, client, extractor))
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
