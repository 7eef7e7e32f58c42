#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod accessor;
/// Azure Blob Storage REST client.
pub mod azure;
mod container;
mod error;
mod listing;
mod memory;

#[doc(hidden)]
pub mod prelude;

pub use crate::accessor::{ContainerAccessor, ContainerHandle};
pub use crate::azure::{AccountCredentials, AzureContainer, BlobServiceClient, BlobServiceConfig};
pub use crate::container::{BlobContainer, ListSegment, PutOutput};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::listing::{LIST_PAGE_SIZE, LIST_TIMEOUT, ListingAggregator};
pub use crate::memory::{ListCall, MemoryContainer};

/// Tracing target for storage operations.
pub const TRACING_TARGET: &str = "imagedrop_storage";
