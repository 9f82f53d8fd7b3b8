use config::{self, File};
use log::{debug, error};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::extract::DEFAULT_USAGE_SELECTOR;
use crate::report::SENSOR_NAME;
use crate::session::{
    ClientOptions, Credentials, Endpoints, DEFAULT_LOGIN_URL, DEFAULT_USAGE_URL,
    DEFAULT_USER_AGENT,
};

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "ELECTRIC_USAGE";

/// Collector configuration
#[derive(Deserialize, Clone)]
pub struct AppConfig {
    /// Display name of the collector
    #[serde(default = "default_name")]
    pub name: String,
    /// Portal username
    pub username: String,
    /// Portal password
    pub password: String,
    /// Login form target
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Usage report page
    #[serde(default = "default_usage_url")]
    pub usage_url: String,
    /// Polling interval in seconds
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// CSS selector of the element carrying the usage figure
    #[serde(default = "default_usage_selector")]
    pub usage_selector: String,
    /// Logging level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_name() -> String {
    SENSOR_NAME.to_string()
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_usage_url() -> String {
    DEFAULT_USAGE_URL.to_string()
}

fn default_scan_interval() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_usage_selector() -> String {
    DEFAULT_USAGE_SELECTOR.to_string()
}

impl AppConfig {
    /// Check the values a collector cannot run without
    pub fn validate(&self) -> std::result::Result<(), AgentError> {
        if self.username.trim().is_empty() {
            return Err(AgentError::Config("username must not be empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(AgentError::Config("password must not be empty".to_string()));
        }
        for (key, url) in [("login_url", &self.login_url), ("usage_url", &self.usage_url)] {
            Url::parse(url)
                .map_err(|e| AgentError::Config(format!("invalid {} '{}': {}", key, url, e)))?;
        }
        if self.scan_interval == 0 {
            return Err(AgentError::Config("scan_interval must be positive".to_string()));
        }
        if self.request_timeout == 0 {
            return Err(AgentError::Config("request_timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            login_url: self.login_url.clone(),
            usage_url: self.usage_url.clone(),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.request_timeout),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_url", &self.login_url)
            .field("usage_url", &self.usage_url)
            .field("scan_interval", &self.scan_interval)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("usage_selector", &self.usage_selector)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Logging level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    #[default]
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

/// Source of configuration
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path; format from the extension
    File(PathBuf),
    /// Environment variables with a prefix
    Environment(String),
    /// TOML string
    Toml(String),
}

/// Map a file extension to a config format
fn file_format(path: &Path) -> std::result::Result<config::FileFormat, AgentError> {
    let extension = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => {
            error!("Configuration file has no extension");
            return Err(AgentError::Config(format!(
                "Configuration file has no extension: {}",
                path.display()
            )));
        }
    };

    match extension.as_str() {
        "toml" => Ok(config::FileFormat::Toml),
        "json" => Ok(config::FileFormat::Json),
        "yaml" | "yml" => Ok(config::FileFormat::Yaml),
        format => {
            error!("Unsupported configuration format: {}", format);
            Err(AgentError::Config(format!("Unsupported config format: {}", format)))
        }
    }
}

/// Environment source for a prefix
///
/// Values stay strings; serde converts the numeric keys, and credentials
/// such as `00417` reach the portal unchanged.
fn environment(prefix: &str) -> config::Environment {
    config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
}

/// Load configuration from sources applied in order, later ones winning
pub fn load_config<T>(sources: Vec<ConfigSource>) -> Result<T>
where
    T: for<'de> Deserialize<'de> + fmt::Debug,
{
    let mut builder = config::Config::builder();

    for source in sources {
        match source {
            ConfigSource::File(path) => {
                if !path.exists() {
                    error!("Configuration file {} does not exist", path.display());
                    return Err(AgentError::Config(format!(
                        "Configuration file not found: {}",
                        path.display()
                    ))
                    .into());
                }

                let format = file_format(&path)?;
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(File::from(path).format(format));
            }
            ConfigSource::Environment(prefix) => {
                debug!("Loading configuration from environment with prefix: {}", prefix);
                builder = builder.add_source(environment(&prefix));
            }
            ConfigSource::Toml(toml_str) => {
                debug!("Loading configuration from TOML string");
                builder =
                    builder.add_source(File::from_str(&toml_str, config::FileFormat::Toml));
            }
        }
    }

    let config = builder
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to build configuration: {}", e)))?;

    let result = config
        .try_deserialize()
        .map_err(|e| AgentError::Config(format!("Failed to deserialize configuration: {}", e)))?;

    debug!("Configuration loaded successfully: {:?}", result);

    Ok(result)
}

/// Configuration builder
pub struct ConfigBuilder<T: for<'de> Deserialize<'de>> {
    sources: Vec<ConfigSource>,
    _marker: PhantomData<T>,
}

impl<T: for<'de> Deserialize<'de> + fmt::Debug> ConfigBuilder<T> {
    /// Create a new config builder
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Add a file source
    pub fn add_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Add environment variables
    pub fn add_env(mut self, prefix: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Environment(prefix.into()));
        self
    }

    /// Add TOML string
    pub fn add_toml(mut self, toml: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Toml(toml.into()));
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<T> {
        load_config::<T>(self.sources)
    }
}

impl<T: for<'de> Deserialize<'de> + fmt::Debug> Default for ConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and validate the collector configuration
///
/// Reads the optional file first, then environment variables prefixed with
/// [`ENV_PREFIX`] (e.g. `ELECTRIC_USAGE_PASSWORD`).
pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = ConfigBuilder::<AppConfig>::new();
    if let Some(path) = path {
        builder = builder.add_file(path);
    }

    let config = builder.add_env(ENV_PREFIX).build()?;
    config.validate()?;
    Ok(config)
}
