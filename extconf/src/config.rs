use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use webhook::config::{Config as WebhookConfig, ValidationError};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "extconf".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive, used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    pub sentry_dsn: Option<String>,
}

pub fn default_log_level() -> String {
    "info".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(flatten)]
    pub webhook: WebhookConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Reads the config file and rejects configs the service cannot run with.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?;
        config.webhook.validate()?;
        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            logging:
                level: debug
                sentry_dsn: https://public@sentry.example.com/1
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            listener:
                host: 0.0.0.0
                port: 8080
            admin_listener:
                host: 127.0.0.1
                port: 8081
            fetch:
                timeout_secs: 10
            config_map:
                acme/widgets: file:///etc/cfg/widgets.yml
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::load(tmp.path()).expect("load config");

        let logging = config.common.logging.expect("logging config");
        assert_eq!(logging.level, "debug");
        assert_eq!(
            logging.sentry_dsn.as_deref(),
            Some("https://public@sentry.example.com/1")
        );

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "extconf");

        assert_eq!(config.webhook.listener.port, 8080);
        assert_eq!(config.webhook.fetch.timeout_secs, 10);
        assert_eq!(
            config
                .webhook
                .config_map
                .get("acme/widgets")
                .map(String::as_str),
            Some("file:///etc/cfg/widgets.yml")
        );
    }

    #[test]
    fn minimal_config() {
        let yaml = r#"
            listener:
                port: 8080
            config_map: {}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::load(tmp.path()).expect("load config");

        assert_eq!(config.common.logging, None);
        assert_eq!(config.common.metrics, None);
        assert_eq!(config.webhook.listener.host, "0.0.0.0");
        assert!(config.webhook.config_map.is_empty());
    }

    #[test]
    fn missing_sections() {
        let tmp = write_tmp_file("listener: {port: 8080}\n");
        assert!(matches!(
            Config::load(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        let tmp = write_tmp_file("config_map: {}\n");
        assert!(matches!(
            Config::load(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn invalid_config() {
        let tmp = write_tmp_file("listener: {port: 0}\nconfig_map: {}\n");
        assert!(matches!(
            Config::load(tmp.path()),
            Err(ConfigError::ValidationError(ValidationError::InvalidPort))
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("config.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}
