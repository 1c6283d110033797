//! Router construction and server host for the status surface.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Request, routing::get};
use drover_core::TransferEngine;
use drover_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::health::{health, metrics};
use crate::http::status::{status_dump, status_summary};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper serving the read-only status routes.
pub struct StatusServer {
    router: Router,
}

impl StatusServer {
    /// Build the router over `engine`, counting requests in `telemetry`.
    #[must_use]
    pub fn new(engine: Arc<dyn TransferEngine>, telemetry: Metrics) -> Self {
        let state = Arc::new(ApiState::new(engine, telemetry.clone()));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Router::new()
            .route("/", get(status_dump))
            .route("/pretty", get(status_summary))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .layer(layered)
            .with_state(state);

        Self { router }
    }

    /// Bind a listener for [`Self::serve`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the address is unavailable.
    pub async fn bind(addr: SocketAddr) -> ApiServerResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })
    }

    /// Serve requests on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] if the accept loop fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "status surface listening");
        }
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) fn router(&self) -> Router {
        self.router.clone()
    }
}
