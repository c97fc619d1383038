//! Aggregation service: fans one inbound request out to the configured
//! downstream tasks, combines their results, and degrades gracefully when
//! some backends are unreachable.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod response;
pub mod service;

use crate::aggregate::Aggregator;
use crate::errors::AggregatorError;
use crate::service::AggregatorService;
use resolver::FixedResolver;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::time::Duration;

/// Starts the aggregation service and its admin listener. Returns only when
/// one of the listeners fails.
pub async fn run(config: config::Config) -> Result<(), AggregatorError> {
    let resolver = Arc::new(FixedResolver::new(config.services.clone()));
    let aggregator = Arc::new(Aggregator::new(
        resolver,
        config.tasks.clone(),
        Duration::from_secs(config.downstream_timeout_secs),
    ));
    tracing::info!(tasks = aggregator.task_count(), "aggregator configured");

    let main_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        AggregatorService::new(aggregator),
    );
    let admin_task = run_http_service::<_, AggregatorError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(|| true),
    );

    tokio::try_join!(main_task, admin_task)?;
    Ok(())
}
