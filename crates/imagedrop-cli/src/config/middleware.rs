//! CORS and request recovery settings of `imagedrop-server`, exposed as
//! arguments (`--allowed-origins`, `--request-timeout`) and environment
//! variables (`CORS_ORIGINS`, `REQUEST_TIMEOUT`).

use clap::Args;
use imagedrop_server::middleware::{CorsConfig, RecoveryConfig};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Middleware configuration combining CORS and recovery settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[clap(flatten)]
    pub cors: CorsConfig,

    /// Request timeout and panic recovery.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            origins = ?self.cors.allowed_origins,
            credentials = self.cors.allow_credentials,
            "CORS configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            request_timeout_secs = self.recovery.request_timeout,
            "Recovery configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        middleware: MiddlewareConfig,
    }

    #[test]
    fn parses_origin_and_timeout_flags() {
        let cli = TestCli::parse_from([
            "imagedrop",
            "--allowed-origins",
            "https://images.example.com,https://cdn.example.com",
            "--request-timeout",
            "60",
        ]);

        assert_eq!(
            cli.middleware.cors.allowed_origins,
            vec!["https://images.example.com", "https://cdn.example.com"]
        );
        assert_eq!(cli.middleware.recovery.request_timeout, 60);
    }
}
