//! Response types for HTTP handlers.

mod error_response;
mod monitors;
mod uploads;

pub use error_response::ErrorResponse;
pub use monitors::{MonitorStatus, ServiceStatus};
pub use uploads::{UPLOAD_FAILED_HEADER, UPLOAD_SUCCEEDED_HEADER, UploadSummaryHeaders};
