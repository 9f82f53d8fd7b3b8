// src/error.rs
use thiserror::Error;

// Re-export anyhow's Result type
pub use anyhow::Result;

/// Setup-time errors (configuration, client construction)
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Failure to authenticate against the portal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("login rejected with status {status}")]
    Rejected { status: u16 },

    #[error("login timed out")]
    Timeout,

    #[error("login request failed: {0}")]
    Transport(String),
}

impl AuthError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::Transport(err.to_string())
        }
    }
}

/// Failure to retrieve the usage page with an authenticated session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("usage page returned status {status}")]
    Status { status: u16 },

    #[error("usage page request timed out")]
    Timeout,

    #[error("usage page request failed: {0}")]
    Transport(String),
}

impl FetchError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Failure to locate or read the usage figure in the page markup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("usage element not found in page")]
    NotFound,

    #[error("usage element text is not a number: {0:?}")]
    Malformed(String),
}

/// Outcome of a failed refresh cycle, shared by every caller joined to it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("refresh cycle ended without an outcome")]
    Interrupted,
}
