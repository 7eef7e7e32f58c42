//! Multipart extractor with improved error handling.
//!
//! [`Multipart`] wraps [`axum::extract::Multipart`] so that a request that
//! is not multipart at all is rejected with a JSON error body.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{FromRequest, Multipart as AxumMultipart, Request};
use derive_more::{Deref, DerefMut, From};

use crate::handler::{Error, ErrorKind};

/// Multipart extractor with improved error handling.
#[must_use]
#[derive(Debug, Deref, DerefMut, From)]
pub struct Multipart(pub AxumMultipart);

impl Multipart {
    /// Returns the inner Axum Multipart extractor.
    #[inline]
    pub fn into_inner(self) -> AxumMultipart {
        self.0
    }
}

impl<S> FromRequest<S> for Multipart
where
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        AxumMultipart::from_request(req, state)
            .await
            .map(Multipart)
            .map_err(Into::into)
    }
}

impl From<MultipartRejection> for Error<'static> {
    fn from(rejection: MultipartRejection) -> Self {
        match rejection {
            MultipartRejection::InvalidBoundary(_) => ErrorKind::BadRequest
                .with_message("Invalid multipart boundary")
                .with_context(
                    "The Content-Type header is missing or has an invalid boundary parameter. \
                     Ensure the request uses 'multipart/form-data' with a valid boundary.",
                ),
            _ => ErrorKind::BadRequest
                .with_message("Invalid multipart request")
                .with_context(format!("Multipart parsing failed: {}", rejection)),
        }
    }
}
