//! HTTP endpoint serving `/metrics` and `/healthz`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::metrics::ExporterMetrics;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

pub fn router(metrics: Arc<ExporterMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(metrics)
}

/// Bind `addr` and serve in the background until `cancel` fires.
/// Binding happens before returning so a taken port fails start-up.
pub async fn start(
    addr: SocketAddr,
    metrics: Arc<ExporterMetrics>,
    cancel: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("listening on {addr}"))?;
    let local_addr = listener.local_addr().context("getting local address")?;
    let app = router(metrics);

    let handle = tokio::spawn(async move {
        info!(addr = %local_addr, "metrics server started");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await;

        if let Err(e) = result {
            error!(error = %e, "metrics server error");
        }
    });

    Ok((local_addr, handle))
}

async fn metrics_handler(State(metrics): State<Arc<ExporterMetrics>>) -> impl IntoResponse {
    match metrics.encode_text() {
        Ok(text) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], text),
        Err(e) => {
            error!(error = %e, "encoding metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                "encoding error".to_string(),
            )
        }
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}
