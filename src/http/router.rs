//! Router construction.
//!
//! # Responsibilities
//! - Serve the metrics snapshot on the configured path
//! - Wire up middleware (request ID, tracing, timeout, request metrics)
//!
//! # Design Decisions
//! - Layers are applied once, after all routes are registered, so user
//!   routes added later still get them

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::observability::metrics::{self, MetricsRegistry};

/// Router serving `GET <path>` from `registry`.
pub fn metrics_router(path: &str, registry: MetricsRegistry) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(registry)
}

/// Wrap `router` with the standard middleware stack.
#[allow(deprecated)]
pub fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = request.request_id().unwrap_or("unknown"),
                )
            }))
            .layer(propagate_request_id_layer())
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(request_timeout)),
    )
}

async fn metrics_handler(State(registry): State<MetricsRegistry>) -> Response {
    match registry.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;

    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}
