//! Request extractors with JSON error responses.
//!
//! - [`Multipart`] - multipart form extraction with descriptive rejections

mod multipart;

pub use crate::extract::multipart::Multipart;
