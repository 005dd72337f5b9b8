pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod payload;
pub mod registry;
pub mod service;
pub mod source;

#[cfg(test)]
mod testutils;

use config::{Listener, TlsConfig};
use errors::WebhookError;
use registry::Registry;
use service::WebhookService;
use shared::admin_service::AdminService;
use shared::http::{bind, run_http_service, serve_http_service};
use shared::tls::{TlsAcceptor, load_acceptor};
use source::Sources;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn load_tls(tls: Option<&TlsConfig>) -> Result<Option<TlsAcceptor>, WebhookError> {
    let acceptor = tls
        .map(|tls| load_acceptor(&tls.cert, &tls.key))
        .transpose()?;
    Ok(acceptor)
}

/// Serves the webhook, and the admin endpoints when configured, until an error occurs.
///
/// The registry is built before the listener starts accepting connections.
/// `/ready` on the admin listener reports success once the webhook listener is bound.
pub async fn run(config: config::Config) -> Result<(), WebhookError> {
    let registry = Arc::new(Registry::new(config.config_map));
    let sources = Sources::new(Duration::from_secs(config.fetch.timeout_secs))?;
    let service = WebhookService::new(registry.clone(), sources);
    let ready = Arc::new(AtomicBool::new(false));

    tokio::try_join!(
        serve_webhook(config.listener, service, registry, ready.clone()),
        serve_admin(config.admin_listener, ready),
    )?;
    Ok(())
}

async fn serve_webhook(
    listener_config: Listener,
    service: WebhookService,
    registry: Arc<Registry>,
    ready: Arc<AtomicBool>,
) -> Result<(), WebhookError> {
    let tls = load_tls(listener_config.tls.as_ref())?;
    let listener = bind(&listener_config.host, listener_config.port).await?;

    tracing::info!(
        address = %listener_config.address(),
        tls = tls.is_some(),
        repositories = registry.len(),
        "Webhook listener started"
    );
    ready.store(true, Ordering::Relaxed);

    serve_http_service(listener, tls, service).await
}

async fn serve_admin(
    admin_listener: Option<Listener>,
    ready: Arc<AtomicBool>,
) -> Result<(), WebhookError> {
    let Some(admin_listener) = admin_listener else {
        return Ok(());
    };
    let tls = load_tls(admin_listener.tls.as_ref())?;
    let admin_service =
        AdminService::<_, WebhookError>::new(move || ready.load(Ordering::Relaxed));

    tracing::info!(address = %admin_listener.address(), "Admin listener started");
    run_http_service(&admin_listener.host, admin_listener.port, tls, admin_service).await
}
