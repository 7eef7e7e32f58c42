//! Service health handlers.

use axum::routing::get;
use axum::{Json, Router};

use crate::handler::response::MonitorStatus;
use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "imagedrop_server::handler::monitors";

#[tracing::instrument(skip_all)]
async fn health_status() -> Json<MonitorStatus> {
    let status = MonitorStatus::default();
    tracing::trace!(target: TRACING_TARGET, version = %status.version, "health check");
    Json(status)
}

/// Returns a [`Router`] with all health monitoring routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/health", get(health_status))
}
