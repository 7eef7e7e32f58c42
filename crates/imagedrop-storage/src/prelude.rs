//! Convenience re-exports.

pub use crate::accessor::{ContainerAccessor, ContainerHandle};
pub use crate::azure::{AccountCredentials, BlobServiceClient, BlobServiceConfig};
pub use crate::container::{BlobContainer, ListSegment, PutOutput};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::listing::ListingAggregator;
