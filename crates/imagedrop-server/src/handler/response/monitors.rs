//! Monitor response types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Overall health of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Serving requests.
    Ok,
}

/// System monitoring status response.
#[must_use]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    /// Timestamp when this status was generated.
    pub checked_at: Timestamp,
    /// Overall system health status.
    pub status: ServiceStatus,
    /// Application version.
    pub version: String,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            checked_at: Timestamp::now(),
            status: ServiceStatus::Ok,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
