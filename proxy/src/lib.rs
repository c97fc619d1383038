//! Reverse proxy router: forwards inbound requests to backend services by
//! logical name, per a static route table fixed at process start.

pub mod config;
pub mod errors;
pub mod forward;
pub mod metrics_defs;
pub mod rules;
pub mod service;

use crate::errors::ProxyError;
use crate::service::ProxyService;
use resolver::FixedResolver;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Starts the proxy and its admin listener. Returns only when one of the
/// listeners fails.
pub async fn run(config: config::Config) -> Result<(), ProxyError> {
    let resolver = Arc::new(FixedResolver::new(config.services.clone()));
    let service = ProxyService::new(&config, resolver);
    tracing::info!(routes = config.routes.len(), "proxy configured");

    let proxy_task = run_http_service(&config.listener.host, config.listener.port, service);
    let admin_task = run_http_service::<_, ProxyError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(|| true),
    );

    tokio::try_join!(proxy_task, admin_task)?;
    Ok(())
}
