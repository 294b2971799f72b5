//! Process liveness surface (spec §6): each worker binary exposes a trivial HTTP
//! endpoint returning 200 "ok". No readiness probe — workers self-recover.

use axum::{routing::get, Router};
use tokio::net::TcpListener;

use crate::shutdown::Shutdown;

pub async fn serve(port: u16, shutdown: Shutdown) -> anyhow::Result<()> {
    let app = Router::new().route("/healthz", get(|| async { "ok" }));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "liveness endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
