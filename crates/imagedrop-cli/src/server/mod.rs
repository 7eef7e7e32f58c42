//! HTTP/HTTPS server startup with lifecycle management.
//!
//! Protocol selection follows the configuration: HTTPS when the `tls`
//! feature is enabled and both certificate paths are set, plain HTTP
//! otherwise.

mod error;
mod http_server;
#[cfg(feature = "tls")]
mod https_server;
mod lifecycle;
mod shutdown;

use axum::Router;

pub use self::error::{ServerError, ServerResult};
use self::http_server::serve_http;
#[cfg(feature = "tls")]
use self::https_server::serve_https;
use self::shutdown::shutdown_signal;
use crate::config::ServerConfig;

/// Starts the server, choosing HTTP or HTTPS from the configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - TLS certificates cannot be loaded (HTTPS mode)
/// - The address cannot be bound
/// - The server encounters a fatal error during operation
pub async fn serve(app: Router, config: ServerConfig) -> ServerResult<()> {
    config
        .validate()
        .map_err(|err| ServerError::invalid_config(&err))?;

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) =
        (config.tls_cert_path.clone(), config.tls_key_path.clone())
    {
        return serve_https(app, config, cert_path, key_path).await;
    }

    serve_http(app, config).await
}
