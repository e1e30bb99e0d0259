//! HTTP server for the Prometheus metrics endpoint.
//!
//! Serves `GET /metrics`; each request drives one full scrape cycle and
//! returns its rendered snapshot. Requests never share registry state, so
//! concurrent scrapes cannot observe mixed or partial values.

use axum::{Router, extract::State, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::scrape::{self, ScrapeOrchestrator};
use crate::source::StatsSource;

/// Handler for GET /metrics - runs a scrape and returns the text exposition.
///
/// Always succeeds: a degraded scrape returns fewer samples plus full
/// metric metadata, indistinguishable from a smaller cluster.
async fn metrics_handler<S: StatsSource + 'static>(
    State(orchestrator): State<Arc<ScrapeOrchestrator<S>>>,
) -> String {
    let outcome = orchestrator.scrape().await;
    scrape::log_outcome(&outcome);
    outcome.body
}

/// Run the HTTP server for the metrics endpoint until shutdown.
pub async fn run_http_server<S: StatsSource + 'static>(
    addr: SocketAddr,
    orchestrator: Arc<ScrapeOrchestrator<S>>,
) -> std::io::Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler::<S>))
        .with_state(orchestrator);

    tracing::info!("Prometheus HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
