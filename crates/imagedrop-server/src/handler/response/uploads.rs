//! Upload response types.

use std::convert::Infallible;

use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};

use crate::service::TransferSummary;

/// Number of transfers that completed.
pub const UPLOAD_SUCCEEDED_HEADER: HeaderName = HeaderName::from_static("x-upload-succeeded");

/// Number of files that were skipped or failed to transfer.
pub const UPLOAD_FAILED_HEADER: HeaderName = HeaderName::from_static("x-upload-failed");

/// Transfer counts reported on the upload redirect.
#[derive(Debug, Clone, Copy)]
pub struct UploadSummaryHeaders(pub TransferSummary);

impl IntoResponseParts for UploadSummaryHeaders {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let summary = self.0;
        let headers = res.headers_mut();
        headers.insert(UPLOAD_SUCCEEDED_HEADER, HeaderValue::from(summary.succeeded));
        headers.insert(UPLOAD_FAILED_HEADER, HeaderValue::from(summary.failed));
        Ok(res)
    }
}
