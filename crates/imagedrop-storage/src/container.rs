//! Container trait shared by the Azure client and the in-memory backend.

use std::num::NonZeroU32;
use std::path::Path;

use bytes::Bytes;

use crate::error::{Error, Result};

/// One page of a flat blob listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSegment {
    /// Blob names in service order.
    pub keys: Vec<String>,
    /// Continuation marker for the next page, `None` on the last page.
    pub next_marker: Option<String>,
}

impl ListSegment {
    /// Creates a segment; an empty marker string is treated as absent.
    pub fn new(keys: Vec<String>, next_marker: Option<String>) -> Self {
        Self {
            keys,
            next_marker: next_marker.filter(|marker| !marker.is_empty()),
        }
    }

    /// Creates the final segment of a listing.
    pub fn last(keys: Vec<String>) -> Self {
        Self::new(keys, None)
    }

    /// Returns `true` if the service reported more pages.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.next_marker.is_some()
    }
}

/// Result of a successful blob upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutput {
    /// HTTP status of the final request of the upload.
    pub status: u16,
    /// Entity tag of the stored blob, if the backend provides one.
    pub e_tag: Option<String>,
    /// Number of bytes transferred.
    pub size: u64,
}

/// A named blob container.
///
/// Implementations perform exactly one service round trip per call; paging,
/// conflict handling and deadlines are layered on top by
/// [`ListingAggregator`](crate::ListingAggregator) and
/// [`ContainerAccessor`](crate::ContainerAccessor).
#[async_trait::async_trait]
pub trait BlobContainer: Send + Sync + 'static {
    /// Container name.
    fn name(&self) -> &str;

    /// Creates the container.
    ///
    /// Fails with [`ErrorKind::Conflict`](crate::ErrorKind::Conflict) when it
    /// already exists.
    async fn create(&self) -> Result<()>;

    /// Fetches one page of blob names starting at `marker`.
    async fn list_segment(
        &self,
        marker: Option<&str>,
        max_results: NonZeroU32,
    ) -> Result<ListSegment>;

    /// Stores `data` as a block blob named `blob_name`, overwriting it.
    async fn put_block_blob(&self, blob_name: &str, data: Bytes) -> Result<PutOutput>;

    /// Uploads the file at `path` as a block blob named `blob_name`.
    async fn upload_file(&self, blob_name: &str, path: &Path) -> Result<PutOutput> {
        let data = tokio::fs::read(path).await.map_err(|err| {
            Error::io(format!("failed to read '{}'", path.display())).with_source(err)
        })?;
        self.put_block_blob(blob_name, Bytes::from(data)).await
    }
}
