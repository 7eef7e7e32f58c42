//! Storage error to HTTP error conversion.

use imagedrop_storage::{Error as StorageError, ErrorKind as StorageErrorKind};

use super::http_error::{Error as HttpError, ErrorKind};

/// Tracing target for storage error conversions.
const TRACING_TARGET: &str = "imagedrop_server::handler::storage";

impl From<StorageError> for HttpError<'static> {
    fn from(error: StorageError) -> Self {
        match error.kind() {
            StorageErrorKind::Config => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    "invalid storage configuration"
                );
            }
            StorageErrorKind::Timeout => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "storage request timed out"
                );
            }
            _ => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    status = ?error.status(),
                    "storage operation failed"
                );
            }
        }

        let context = error.message().to_owned();

        match error.kind() {
            StorageErrorKind::Config => ErrorKind::InternalServerError
                .with_message("Storage is misconfigured")
                .with_context(context),

            StorageErrorKind::Timeout => ErrorKind::GatewayTimeout
                .with_message("Storage did not respond in time")
                .with_context(context),

            StorageErrorKind::Protocol => ErrorKind::BadGateway
                .with_message("Storage returned an unreadable response")
                .with_context(context),

            StorageErrorKind::Conflict | StorageErrorKind::Transport => ErrorKind::BadGateway
                .with_message("Storage request failed")
                .with_context(context),

            StorageErrorKind::Io => ErrorKind::InternalServerError
                .with_message("Local file operation failed")
                .with_context(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn maps_storage_kinds_to_status() {
        let cases = [
            (StorageError::config("bad key"), StatusCode::INTERNAL_SERVER_ERROR),
            (StorageError::timeout("slow"), StatusCode::GATEWAY_TIMEOUT),
            (StorageError::protocol("garbage"), StatusCode::BAD_GATEWAY),
            (
                StorageError::transport("forbidden").with_status(403),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, status) in cases {
            let error = HttpError::from(error);
            assert_eq!(error.kind().status_code(), status);
        }
    }

    #[test]
    fn keeps_storage_message_as_context() {
        let error = HttpError::from(StorageError::transport("ServerBusy: try later"));
        assert_eq!(error.context(), Some("ServerBusy: try later"));
    }
}
