//! Observability middleware for request tracing.
//!
//! Every request gets a unique `x-request-id` (kept when the client already
//! sent one), a tracing span, and redacted sensitive headers.

use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::http::header;
use axum::middleware::{Next, from_fn};
use axum::response::Response;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Tracing target for request timing.
const TRACING_TARGET: &str = "imagedrop_server::middleware::observability";

/// Header carrying the request ID.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension trait for `axum::`[`Router`] to apply observability middleware.
pub trait RouterObservabilityExt<S> {
    /// Layers request IDs, structured request spans and header redaction.
    fn with_observability(self) -> Self;
}

impl<S> RouterObservabilityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        self.layer(from_fn(track_request_timing))
            .layer(PropagateRequestIdLayer::new(header::HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(SetSensitiveRequestHeadersLayer::new([
                header::AUTHORIZATION,
                header::COOKIE,
            ]))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(
                header::HeaderName::from_static(REQUEST_ID_HEADER),
                MakeRequestUuid,
            ))
    }
}

/// Logs method, path, status, body sizes and duration of every request.
async fn track_request_timing(request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let request_size = content_length(request.headers());
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_default();

    tracing::trace!(
        target: TRACING_TARGET,
        method = %method,
        uri = %uri,
        request_id = %request_id,
        request_size,
        "request started"
    );

    let response = next.run(request).await;
    let duration = start_time.elapsed();

    tracing::debug!(
        target: TRACING_TARGET,
        method = %method,
        uri = %uri,
        request_id = %request_id,
        status = %response.status(),
        duration_ms = duration.as_millis() as u64,
        request_size,
        response_size = content_length(response.headers()),
        "request completed"
    );

    response
}

fn content_length(headers: &header::HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
}
