//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - Observability (request IDs, tracing spans, sensitive headers)
//! - Recovery (timeouts, panics, service errors)
//! - Security (CORS, security headers, body limits)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::Router;
//! use imagedrop_server::middleware::{
//!     RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt,
//! };
//!
//! let app: Router = Router::new()
//!     .with_default_security()
//!     .with_observability()
//!     .with_default_recovery();
//! ```

mod observability;
mod recovery;
mod security;

pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{
    BodyLimitConfig, CorsConfig, FrameOptions, ReferrerPolicy, RouterSecurityExt,
    SecurityHeadersConfig,
};
