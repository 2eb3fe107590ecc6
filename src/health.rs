//! Liveness and readiness endpoints

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tracing::info;

/// Build the probe router serving `/healthz` and `/readyz`
pub fn probe_routes() -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
}

/// Serve the probe endpoints on `addr`
pub async fn serve_probes(addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Health probe server started");
    axum::serve(listener, probe_routes()).await
}
