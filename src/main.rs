//! mongodb-exporter - Prometheus exporter for MongoDB storage statistics.
//!
//! Scrapes database- and collection-level stats (dbStats/collStats) from a
//! mongod or mongos node and exposes them as gauges on `/metrics`.

mod config;
mod error;
mod http;
mod registry;
mod scrape;
mod source;
mod topology;

use crate::config::Config;
use crate::scrape::ScrapeOrchestrator;
use crate::source::MongoStatsSource;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        mode = ?config.mongodb.mode,
        listen = %config.server.listen,
        "Starting mongodb-exporter"
    );

    // The driver connects lazily; an unreachable cluster surfaces as
    // degraded scrapes, not a startup failure.
    let client = mongodb::Client::with_uri_str(&config.mongodb.uri).await?;
    let source = MongoStatsSource::new(client);

    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        source,
        config.mongodb.mode,
        config.mongodb.excluded_databases(),
        config.mongodb.stats_timeout(),
    ));
    info!(
        gauges = orchestrator.describe().len(),
        excluded = ?config.mongodb.excluded_databases(),
        "Metric catalogue declared"
    );

    http::run_http_server(config.server.listen, orchestrator).await?;
    Ok(())
}
