mod config;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "junction", about = "Edge layer: reverse proxy router and aggregation service")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, default_value = "junction.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the reverse proxy router
    Proxy,
    /// Run the aggregation service
    Aggregator,
}

#[derive(thiserror::Error, Debug)]
enum JunctionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid proxy configuration: {0}")]
    ProxyConfig(#[from] proxy::config::ValidationError),

    #[error("invalid aggregator configuration: {0}")]
    AggregatorConfig(#[from] aggregator::config::ValidationError),

    #[error("could not install metrics exporter: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Proxy(#[from] proxy::errors::ProxyError),

    #[error(transparent)]
    Aggregator(#[from] aggregator::errors::AggregatorError),
}

fn main() -> Result<(), JunctionError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_file(&cli.config)?;

    // Keep the guard alive for the whole process; events flush on drop.
    let _sentry_guard = config.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    if let Some(metrics_config) = &config.metrics {
        install_statsd(metrics_config)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        CliCommand::Proxy => {
            let proxy_config = config.proxy.ok_or(ConfigError::MissingSection("proxy"))?;
            proxy_config.validate()?;
            tracing::info!("starting proxy");
            runtime.block_on(proxy::run(proxy_config))?;
        }
        CliCommand::Aggregator => {
            let aggregator_config = config
                .aggregator
                .ok_or(ConfigError::MissingSection("aggregator"))?;
            aggregator_config.validate()?;
            tracing::info!("starting aggregator");
            runtime.block_on(aggregator::run(aggregator_config))?;
        }
    }

    Ok(())
}

fn install_statsd(config: &MetricsConfig) -> Result<(), JunctionError> {
    let recorder = StatsdBuilder::from(&config.statsd_host, config.statsd_port)
        .build(Some("junction"))
        .map_err(|e| JunctionError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| JunctionError::Metrics(e.to_string()))?;
    Ok(())
}
