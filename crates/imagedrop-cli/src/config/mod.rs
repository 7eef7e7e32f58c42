//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig          # Host, port, TLS, shutdown
//! ├── middleware: MiddlewareConfig  # CORS, recovery/timeouts
//! ├── storage: StorageConfig        # Account, key, containers
//! └── upload: UploadConfig          # Listing, staging, transfer policy
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod middleware;
mod server;
mod service;

use std::process;

use anyhow::Context;
use clap::Parser;
use imagedrop_server::service::ServiceConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use self::middleware::MiddlewareConfig;
pub use self::server::ServerConfig;
pub use self::service::{StorageConfig, UploadConfig};
use crate::TRACING_TARGET_SERVER_STARTUP;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "imagedrop")]
#[command(about = "Image upload and thumbnail listing server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (CORS, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Blob storage account and containers.
    #[clap(flatten)]
    pub storage: StorageConfig,

    /// Listing and upload behavior.
    #[clap(flatten)]
    pub upload: UploadConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its values
    /// serve as environment defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        Ok(())
    }

    /// Builds the service configuration.
    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        service::service_config(&self.storage, &self.upload)
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.middleware.log();
        self.storage.log();
        self.upload.log();
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "tls").then_some("tls"),
            cfg!(feature = "dotenv").then_some("dotenv"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
