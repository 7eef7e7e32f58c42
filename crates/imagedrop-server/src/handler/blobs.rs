//! Thumbnail listing handlers.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::handler::{Error, Result};
use crate::service::{BlobListing, ServiceState};

/// Tracing target for listing operations.
const TRACING_TARGET: &str = "imagedrop_server::handler::blobs";

/// Lists every thumbnail as a full blob URL.
#[tracing::instrument(skip_all)]
async fn list_blobs(State(listing): State<BlobListing>) -> Result<Json<Vec<String>>> {
    tracing::debug!(
        target: TRACING_TARGET,
        container = %listing.container_name(),
        "listing thumbnails"
    );

    let urls = listing.list().await.map_err(|err| {
        Error::from(err).with_resource(listing.container_name().to_owned())
    })?;

    tracing::info!(
        target: TRACING_TARGET,
        count = urls.len(),
        "thumbnails listed"
    );

    Ok(Json(urls))
}

/// Returns a [`Router`] with the listing routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/list", get(list_blobs).post(list_blobs))
}
