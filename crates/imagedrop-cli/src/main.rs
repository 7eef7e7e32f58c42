#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use imagedrop_server::handler::routes;
use imagedrop_server::middleware::{
    BodyLimitConfig, RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt,
    SecurityHeadersConfig,
};
use imagedrop_server::service::{ServiceConfig, ServiceState};

use crate::config::{Cli, MiddlewareConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "imagedrop_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "imagedrop_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "imagedrop_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting imagedrop server"
    );

    cli.log();
    cli.validate()?;

    let config = cli.service_config()?;
    let state = ServiceState::new(&config)
        .await
        .context("failed to create service state")?;
    let router = create_router(state, &cli.middleware, &config);

    server::serve(router, cli.server).await?;

    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Security - CORS, security headers, body limits
/// 4. Routes (innermost) - actual request handlers
fn create_router(
    state: ServiceState,
    middleware: &MiddlewareConfig,
    config: &ServiceConfig,
) -> Router {
    routes()
        .with_state(state)
        .with_security(
            &middleware.cors,
            &SecurityHeadersConfig::default(),
            &BodyLimitConfig::new(config.max_request_size),
        )
        .with_observability()
        .with_recovery(&middleware.recovery)
}
