use crate::config::{LoggingConfig, default_log_level};
use sentry::ClientInitGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when RUST_LOG is not set.
fn default_filter(config: Option<&LoggingConfig>) -> EnvFilter {
    let level = config
        .map(|logging| logging.level.clone())
        .unwrap_or_else(default_log_level);
    EnvFilter::try_new(&level).unwrap_or_else(|e| {
        eprintln!("Invalid log level {level:?} ({e}), using info");
        EnvFilter::new("info")
    })
}

/// Installs the global tracing subscriber, with sentry reporting when a DSN is configured.
///
/// The returned guard flushes pending sentry events on drop and must be held
/// for the lifetime of the process.
pub fn init(config: Option<&LoggingConfig>) -> Option<ClientInitGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    let sentry_guard = config
        .and_then(|logging| logging.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });
    let sentry_layer = sentry_guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    sentry_guard
}
