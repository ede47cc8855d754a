//! Minimal status/health HTTP surface, bound only when `--port` is
//! non-zero. Reads the shared metrics snapshot; never touches the DB
//! connections or classifier state owned by the writer task.

use crate::metrics::ReplayMetrics;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Serialize)]
struct StatusResponse {
    queries: u64,
    transactions: u64,
    avg_txn_micros: u64,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(metrics): State<ReplayMetrics>) -> Json<StatusResponse> {
    let snapshot = metrics.snapshot();
    Json(StatusResponse {
        queries: snapshot.queries,
        transactions: snapshot.transactions,
        avg_txn_micros: snapshot.avg_txn_micros,
    })
}

/// Polls `shutdown` until it's set, so the server future resolves shortly
/// after the writer task begins shutting down instead of answering
/// requests for as long as the process happens to linger afterward.
async fn watch_for_shutdown(shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

pub async fn serve(port: u16, metrics: ReplayMetrics, shutdown: Arc<AtomicBool>) -> std::io::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .with_state(metrics);

    let addr = format!("127.0.0.1:{port}");
    info!(%addr, "binding status endpoint");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(watch_for_shutdown(shutdown))
        .await
}
