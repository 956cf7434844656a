//! HTTP metrics endpoint for Prometheus scraping.
//!
//! Serves `/metrics` in Prometheus text format and a `/health` probe.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    registry::MetricsRegistry,
    types::{MetricError, MetricResult},
};

/// Metrics HTTP server
pub struct MetricsServer {
    bind_address: SocketAddr,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(bind_address: SocketAddr, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            bind_address,
            registry,
        }
    }

    fn build_router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(self.registry.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .into_inner(),
            )
    }

    /// Bind the listener; fails early when the address is taken
    pub async fn bind(self) -> MetricResult<BoundMetricsServer> {
        let listener = TcpListener::bind(&self.bind_address)
            .await
            .map_err(|e| MetricError::HttpServerError(format!("Failed to bind: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MetricError::HttpServerError(e.to_string()))?;

        Ok(BoundMetricsServer {
            listener,
            local_addr,
            router: self.build_router(),
        })
    }
}

/// A metrics server with its listener bound
pub struct BoundMetricsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl BoundMetricsServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve(self) -> MetricResult<()> {
        tracing::info!(address = %self.local_addr, "Metrics server listening");

        axum::serve(self.listener, self.router)
            .await
            .map_err(|e| MetricError::HttpServerError(e.to_string()))
    }

    /// Serve in the background
    pub fn spawn(self) -> tokio::task::JoinHandle<MetricResult<()>> {
        tokio::spawn(self.serve())
    }
}

async fn metrics_handler(State(registry): State<Arc<MetricsRegistry>>) -> Response {
    match registry.encode_to_string() {
        Ok(metrics) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
