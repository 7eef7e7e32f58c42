//! HTTPS server startup using rustls.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;

use crate::TRACING_TARGET_SERVER_STARTUP;
use crate::config::ServerConfig;
use crate::server::lifecycle::serve_with_shutdown;
use crate::server::{ServerError, ServerResult, shutdown_signal};

/// Serves `app` over HTTPS until a shutdown signal.
pub async fn serve_https(
    app: Router,
    server_config: ServerConfig,
    cert_path: PathBuf,
    key_path: PathBuf,
) -> ServerResult<()> {
    let server_addr = server_config.server_addr();
    let shutdown_timeout = server_config.shutdown_timeout();

    validate_tls_files(&cert_path, &key_path)?;

    let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
        .await
        .map_err(|err| {
            ServerError::TlsCertificate(format!("failed to load TLS certificates: {err}"))
        })?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        cert_path = %cert_path.display(),
        key_path = %key_path.display(),
        "TLS certificates loaded successfully"
    );

    serve_with_shutdown(&server_config, move || async move {
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();

        tokio::spawn(async move {
            shutdown_signal(shutdown_timeout).await;
            shutdown_handle.graceful_shutdown(Some(shutdown_timeout));
        });

        axum_server::bind_rustls(server_addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
    })
    .await
}

fn validate_tls_files(cert_path: &Path, key_path: &Path) -> ServerResult<()> {
    let validate_file = |path: &Path, file_type: &str| -> ServerResult<()> {
        let metadata = std::fs::metadata(path).map_err(|err| {
            ServerError::TlsCertificate(format!(
                "cannot read {} file {}: {}",
                file_type,
                path.display(),
                err
            ))
        })?;

        if !metadata.is_file() {
            return Err(ServerError::TlsCertificate(format!(
                "{} path is not a file: {}",
                file_type,
                path.display()
            )));
        }

        if metadata.len() == 0 {
            return Err(ServerError::TlsCertificate(format!(
                "{} file is empty: {}",
                file_type,
                path.display()
            )));
        }

        Ok(())
    };

    validate_file(cert_path, "certificate")?;
    validate_file(key_path, "private key")?;
    Ok(())
}
