//! HTTP server startup.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::TRACING_TARGET_SERVER_STARTUP;
use crate::config::ServerConfig;
use crate::server::lifecycle::serve_with_shutdown;
use crate::server::{ServerError, ServerResult, shutdown_signal};

/// Binds the configured address and serves `app` until a shutdown signal.
pub async fn serve_http(app: Router, server_config: ServerConfig) -> ServerResult<()> {
    let server_addr = server_config.server_addr();

    let listener = TcpListener::bind(server_addr).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            addr = %server_addr,
            error = %err,
            "Failed to bind to address"
        );
        ServerError::bind_error(server_addr, err)
    })?;

    let shutdown = shutdown_signal(server_config.shutdown_timeout());
    serve_with_shutdown(&server_config, || async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    })
    .await
}
