//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use imagedrop_server::handler::routes;
//! use imagedrop_server::service::{ServiceConfig, ServiceState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::builder()
//!     .with_account_name("account")
//!     .with_account_key("c2VjcmV0")
//!     .with_thumbnail_container("thumbnails")
//!     .with_image_container("images")
//!     .build()?;
//!
//! let state = ServiceState::new(&config).await?;
//! let router: axum::Router = routes().with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod blobs;
mod error;
mod monitors;
mod response;
mod uploads;

use axum::Router;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::response::{
    MonitorStatus, ServiceStatus, UPLOAD_FAILED_HEADER, UPLOAD_SUCCEEDED_HEADER,
};
use crate::service::ServiceState;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with all routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .merge(blobs::routes())
        .merge(uploads::routes())
        .merge(monitors::routes())
        .fallback(handler)
}
