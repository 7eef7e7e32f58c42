//! Security middleware for HTTP request protection.
//!
//! CORS configuration, security headers and request body size limits.

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{self, HeaderValue};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;

/// Default maximum request body size: 100 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Extension trait for `axum::`[`Router`] to apply security middleware.
pub trait RouterSecurityExt<S> {
    /// Layers CORS rules, security headers and request body limits.
    fn with_security(
        self,
        cors: &CorsConfig,
        headers: &SecurityHeadersConfig,
        body_limit: &BodyLimitConfig,
    ) -> Self;

    /// Layers security middlewares with default configurations.
    fn with_default_security(self) -> Self;
}

impl<S> RouterSecurityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(
        self,
        cors: &CorsConfig,
        headers: &SecurityHeadersConfig,
        body_limit: &BodyLimitConfig,
    ) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(cors.to_header_values())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_credentials(cors.allow_credentials)
            .max_age(cors.max_age());

        let mut router = self
            .layer(DefaultBodyLimit::max(body_limit.max_body_size))
            .layer(RequestBodyLimitLayer::new(body_limit.max_body_size))
            .layer(cors_layer)
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static(headers.frame_options.as_str()),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::REFERRER_POLICY,
                HeaderValue::from_static(headers.referrer_policy.as_str()),
            ));

        if let Ok(hsts) = HeaderValue::from_str(&headers.hsts_header_value()) {
            router = router.layer(SetResponseHeaderLayer::overriding(
                header::STRICT_TRANSPORT_SECURITY,
                hsts,
            ));
        }

        if let Some(csp) = headers
            .content_security_policy
            .as_deref()
            .and_then(|csp| HeaderValue::from_str(csp).ok())
        {
            router = router.layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_SECURITY_POLICY,
                csp,
            ));
        }

        router
    }

    fn with_default_security(self) -> Self {
        self.with_security(
            &CorsConfig::default(),
            &SecurityHeadersConfig::default(),
            &BodyLimitConfig::default(),
        )
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CorsConfig {
    /// List of allowed CORS origins.
    ///
    /// If empty, defaults to localhost origins for development.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_ORIGINS", value_delimiter = ',')
    )]
    pub allowed_origins: Vec<String>,

    /// Maximum age for CORS preflight requests in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_MAX_AGE", default_value = "3600")
    )]
    pub max_age_seconds: u64,

    /// Whether to allow credentials in CORS requests.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_ALLOW_CREDENTIALS", default_value = "false")
    )]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
            allow_credentials: false,
        }
    }
}

impl CorsConfig {
    /// Returns the CORS max age as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Converts configured origins to HeaderValue list, falling back to localhost for development.
    pub fn to_header_values(&self) -> Vec<HeaderValue> {
        if self.allowed_origins.is_empty() {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:8080"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
                HeaderValue::from_static("http://127.0.0.1:8080"),
            ]
        } else {
            self.allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect()
        }
    }
}

/// Request body size limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct BodyLimitConfig {
    /// Largest accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for BodyLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

impl BodyLimitConfig {
    /// Creates a limit of `max_body_size` bytes.
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

/// Security headers configuration for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct SecurityHeadersConfig {
    /// HSTS max age in seconds. Forces browsers to use HTTPS for this duration.
    pub hsts_max_age_seconds: u64,

    /// Whether to include subdomains in HSTS policy.
    pub hsts_include_subdomains: bool,

    /// Content Security Policy directives controlling resource loading.
    pub content_security_policy: Option<String>,

    /// X-Frame-Options value protecting against clickjacking.
    pub frame_options: FrameOptions,

    /// Referrer-Policy controlling referrer information in requests.
    pub referrer_policy: ReferrerPolicy,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            hsts_max_age_seconds: 31_536_000,
            hsts_include_subdomains: true,
            content_security_policy: Some(
                "default-src 'self'; \
                 img-src 'self' data: https://*.blob.core.windows.net; \
                 frame-ancestors 'none'; \
                 base-uri 'self'; \
                 form-action 'self'"
                    .to_owned(),
            ),
            frame_options: FrameOptions::Deny,
            referrer_policy: ReferrerPolicy::StrictOriginWhenCrossOrigin,
        }
    }
}

impl SecurityHeadersConfig {
    /// Returns the HSTS header value as a string.
    pub fn hsts_header_value(&self) -> String {
        if self.hsts_include_subdomains {
            format!("max-age={}; includeSubDomains", self.hsts_max_age_seconds)
        } else {
            format!("max-age={}", self.hsts_max_age_seconds)
        }
    }
}

/// X-Frame-Options header values controlling frame embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOptions {
    /// The page cannot be displayed in a frame, regardless of the site.
    Deny,
    /// The page can only be displayed in a frame on the same origin.
    SameOrigin,
}

impl FrameOptions {
    /// Returns the header value string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "DENY",
            Self::SameOrigin => "SAMEORIGIN",
        }
    }
}

/// Referrer-Policy header values controlling referrer information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferrerPolicy {
    /// No referrer information is sent.
    NoReferrer,
    /// Sends only the origin as the referrer.
    Origin,
    /// Sends full URL for same-origin, only origin for cross-origin.
    StrictOriginWhenCrossOrigin,
}

impl ReferrerPolicy {
    /// Returns the header value string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoReferrer => "no-referrer",
            Self::Origin => "origin",
            Self::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
        }
    }
}
