mod config;
mod logging;
mod metrics;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process::ExitCode;
use webhook::errors::WebhookError;

const DEFAULT_CONFIG_PATH: &str = "/etc/extconf/config.yaml";

/// Serves pipeline configs registered outside of the repositories they belong to.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Load and validate the config file, then exit
    CheckConfig,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not set up metrics: {0}")]
    Metrics(#[from] metrics::MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("webhook server failed: {0}")]
    Webhook(#[from] WebhookError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(&cli.config)?;

    if let Some(CliCommand::CheckConfig) = cli.command {
        println!(
            "{}: ok ({} repositories registered)",
            cli.config.display(),
            config.webhook.config_map.len()
        );
        return Ok(());
    }

    // Sentry must be initialized before the runtime starts.
    let _sentry_guard = logging::init(config.common.logging.as_ref());
    if let Some(metrics_config) = &config.common.metrics {
        metrics::init(metrics_config)?;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "Starting extconf"
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = rt.block_on(async {
        tokio::select! {
            result = webhook::run(config.webhook) => result,
            _ = shutdown_signal() => Ok(()),
        }
    });

    if let Err(e) = &result {
        tracing::error!(error = %e, "Webhook server failed");
    }
    Ok(result?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Signal received, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["extconf"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(cli.command.is_none());

        let cli =
            Cli::try_parse_from(["extconf", "-c", "/tmp/config.yaml", "check-config"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/config.yaml"));
        assert!(matches!(cli.command, Some(CliCommand::CheckConfig)));
    }

    #[test]
    fn test_check_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "listener: {port: 8080}\nconfig_map: {acme/widgets: 'file:///etc/cfg/widgets.yml'}\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "extconf".as_ref(),
            "--config".as_ref(),
            path.as_os_str(),
            "check-config".as_ref(),
        ])
        .unwrap();
        assert!(run(cli).is_ok());

        let cli = Cli::try_parse_from([
            "extconf".as_ref(),
            "--config".as_ref(),
            dir.path().join("missing.yaml").as_os_str(),
            "check-config".as_ref(),
        ])
        .unwrap();
        assert!(matches!(run(cli), Err(CliError::Config(_))));
    }
}
