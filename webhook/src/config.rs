use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Admin listener cannot use the same address as the main listener: {0}")]
    AdminListenerConflict(String),

    #[error("Fetch timeout cannot be 0")]
    InvalidFetchTimeout,

    #[error("Empty repository slug in config_map")]
    EmptySlug,
}

/// Webhook responder configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener receiving build notifications from the CI server
    pub listener: Listener,
    /// Optional listener for health and readiness probes
    pub admin_listener: Option<Listener>,
    /// Settings for retrieving external configs
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Maps a repository slug ("owner/name") to the URL of its external config
    ///
    /// Note: values are kept as plain strings. A location that does not parse is
    /// not a startup error; requests for that repository fall back to the config
    /// stored in the repository.
    pub config_map: HashMap<String, String>,
}

impl Config {
    /// Validates the webhook configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if let Some(admin_listener) = &self.admin_listener {
            admin_listener.validate()?;
            if admin_listener.address() == self.listener.address() {
                return Err(ValidationError::AdminListenerConflict(
                    admin_listener.address(),
                ));
            }
        }

        if self.fetch.timeout_secs == 0 {
            return Err(ValidationError::InvalidFetchTimeout);
        }

        if self.config_map.keys().any(|slug| slug.is_empty()) {
            return Err(ValidationError::EmptySlug);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Serve HTTPS instead of plain HTTP when set
    pub tls: Option<TlsConfig>,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: default_host(),
            port: default_port(),
            tls: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    80
}

/// PEM files for the certificate chain and private key
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FetchConfig {
    /// Upper bound for retrieving one config over HTTP, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
