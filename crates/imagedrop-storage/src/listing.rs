//! Paginated listing aggregation.

use std::num::NonZeroU32;
use std::time::Duration;

use crate::TRACING_TARGET;
use crate::accessor::{ContainerAccessor, ContainerHandle};
use crate::error::{Error, Result};

/// Default number of blob names requested per page.
pub const LIST_PAGE_SIZE: NonZeroU32 = match NonZeroU32::new(10) {
    Some(size) => size,
    None => unreachable!(),
};

/// Default deadline for a complete listing.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(50);

/// Collects every blob name of a container by following continuation
/// markers.
///
/// Pages are fetched strictly one after another: page `n + 1` is requested
/// only once page `n` and its marker are known. The loop ends on the first
/// page without a marker; an empty page that still carries a marker does not
/// end it.
#[derive(Debug, Clone)]
pub struct ListingAggregator {
    page_size: NonZeroU32,
    url_prefix: Option<String>,
    timeout: Option<Duration>,
}

impl Default for ListingAggregator {
    fn default() -> Self {
        Self::new(LIST_PAGE_SIZE)
    }
}

impl ListingAggregator {
    /// Creates an aggregator that requests `page_size` names per page.
    pub fn new(page_size: NonZeroU32) -> Self {
        Self {
            page_size,
            url_prefix: None,
            timeout: None,
        }
    }

    /// Prefixes every name with `{base_url}/{container}/`.
    pub fn with_url_prefix(mut self, base_url: &str, container: &str) -> Self {
        self.url_prefix = Some(format!(
            "{}/{}/",
            base_url.trim_end_matches('/'),
            container.trim_matches('/')
        ));
        self
    }

    /// Bounds the whole listing by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Configured page size.
    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    /// Lists every blob in an already opened container.
    ///
    /// Any page failure aborts the listing and discards what was collected so
    /// far. When a timeout is configured and exceeded, fails with
    /// [`ErrorKind::Timeout`](crate::ErrorKind::Timeout).
    #[tracing::instrument(
        name = "listing.aggregate",
        skip(self, container),
        fields(container = %container.name(), page_size = self.page_size.get())
    )]
    pub async fn aggregate(&self, container: &ContainerHandle) -> Result<Vec<String>> {
        self.within_timeout(container.name(), self.collect_pages(container))
            .await
    }

    /// Ensures the container exists, then lists every blob in it.
    ///
    /// The configured timeout bounds the create call and every page fetch
    /// together.
    #[tracing::instrument(
        name = "listing.open_and_aggregate",
        skip(self, accessor),
        fields(container = %accessor.container_name(), page_size = self.page_size.get())
    )]
    pub async fn open_and_aggregate(&self, accessor: &ContainerAccessor) -> Result<Vec<String>> {
        let listing = async {
            let handle = accessor.open().await?;
            self.collect_pages(&handle).await
        };

        self.within_timeout(accessor.container_name(), listing).await
    }

    async fn within_timeout(
        &self,
        container: &str,
        listing: impl Future<Output = Result<Vec<String>>>,
    ) -> Result<Vec<String>> {
        let Some(timeout) = self.timeout else {
            return listing.await;
        };

        match tokio::time::timeout(timeout, listing).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    container,
                    timeout_ms = timeout.as_millis() as u64,
                    "listing timed out"
                );
                Err(Error::timeout(format!(
                    "listing container '{container}' exceeded {}s",
                    timeout.as_secs_f32()
                )))
            }
        }
    }

    async fn collect_pages(&self, container: &ContainerHandle) -> Result<Vec<String>> {
        let mut listing = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let segment = container
                .list_segment(marker.as_deref(), self.page_size)
                .await
                .inspect_err(|err| {
                    tracing::error!(
                        target: TRACING_TARGET,
                        container = %container.name(),
                        page = pages,
                        error = %err,
                        "failed to fetch listing page"
                    );
                })?;
            pages += 1;

            if segment.keys.is_empty() {
                tracing::debug!(target: TRACING_TARGET, page = pages, "empty listing page");
            }

            listing.reserve(segment.keys.len());
            for key in segment.keys {
                tracing::trace!(target: TRACING_TARGET, blob = %key, "listed blob");
                listing.push(self.format_key(key));
            }

            match segment.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            container = %container.name(),
            pages,
            blobs = listing.len(),
            "listing completed"
        );

        Ok(listing)
    }

    fn format_key(&self, key: String) -> String {
        match &self.url_prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::container::ListSegment;
    use crate::error::ErrorKind;
    use crate::memory::MemoryContainer;

    fn keys(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("blob-{i:02}")).collect()
    }

    async fn open(container: &Arc<MemoryContainer>) -> ContainerHandle {
        ContainerAccessor::new(container.clone()).open().await.unwrap()
    }

    #[tokio::test]
    async fn follows_markers_across_three_pages() {
        let container = Arc::new(MemoryContainer::new("thumbnails").with_pages([
            ListSegment::new(keys(0..10), Some("m1".into())),
            ListSegment::new(keys(10..20), Some("m2".into())),
            ListSegment::last(keys(20..25)),
        ]));
        let handle = open(&container).await;

        let listing = ListingAggregator::default().aggregate(&handle).await.unwrap();

        assert_eq!(listing, keys(0..25));
        let calls = container.list_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].marker, None);
        assert_eq!(calls[1].marker.as_deref(), Some("m1"));
        assert_eq!(calls[2].marker.as_deref(), Some("m2"));
        assert!(calls.iter().all(|call| call.max_results == 10));
    }

    #[tokio::test]
    async fn empty_container_takes_one_fetch() {
        let container = Arc::new(MemoryContainer::new("thumbnails"));
        let handle = open(&container).await;

        let listing = ListingAggregator::default().aggregate(&handle).await.unwrap();

        assert!(listing.is_empty());
        assert_eq!(container.list_calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_page_with_marker_keeps_going() {
        let container = Arc::new(MemoryContainer::new("thumbnails").with_pages([
            ListSegment::new(Vec::new(), Some("m1".into())),
            ListSegment::last(keys(0..2)),
        ]));
        let handle = open(&container).await;

        let listing = ListingAggregator::default().aggregate(&handle).await.unwrap();

        assert_eq!(listing, keys(0..2));
        assert_eq!(container.list_calls().len(), 2);
    }

    #[tokio::test]
    async fn page_failure_aborts_listing() {
        let container = Arc::new(MemoryContainer::new("thumbnails").with_pages([
            ListSegment::new(keys(0..10), Some("m1".into())),
            ListSegment::new(keys(10..20), Some("m2".into())),
            ListSegment::last(keys(20..25)),
        ]));
        container.fail_list_at(1, Error::transport("server busy").with_status(503));
        let handle = open(&container).await;

        let err = ListingAggregator::default().aggregate(&handle).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(container.list_calls().len(), 2);
    }

    #[tokio::test]
    async fn pages_stored_blobs_with_exact_fetch_count() {
        let container = Arc::new(MemoryContainer::new("thumbnails"));
        for key in keys(0..23) {
            container.insert(key, "png");
        }
        let handle = open(&container).await;

        let aggregator = ListingAggregator::new(NonZeroU32::new(5).unwrap());
        let listing = aggregator.aggregate(&handle).await.unwrap();

        assert_eq!(listing, keys(0..23));
        assert_eq!(container.list_calls().len(), 5);
    }

    #[tokio::test]
    async fn prefixes_keys_with_container_url() {
        let container = Arc::new(
            MemoryContainer::new("thumbnails").with_pages([ListSegment::last(vec!["cat.png".into()])]),
        );
        let handle = open(&container).await;

        let listing = ListingAggregator::default()
            .with_url_prefix("https://acct.blob.core.windows.net/", "thumbnails")
            .aggregate(&handle)
            .await
            .unwrap();

        assert_eq!(
            listing,
            vec!["https://acct.blob.core.windows.net/thumbnails/cat.png"]
        );
    }

    #[tokio::test]
    async fn slow_listing_times_out() {
        let container = Arc::new(
            MemoryContainer::new("thumbnails").with_list_delay(Duration::from_millis(500)),
        );
        let handle = open(&container).await;

        let err = ListingAggregator::default()
            .with_timeout(Duration::from_millis(20))
            .aggregate(&handle)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn timeout_covers_container_creation() {
        let container = Arc::new(
            MemoryContainer::new("thumbnails").with_create_delay(Duration::from_millis(500)),
        );
        let accessor = ContainerAccessor::new(container.clone());

        let err = ListingAggregator::default()
            .with_timeout(Duration::from_millis(20))
            .open_and_aggregate(&accessor)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(container.list_calls().is_empty());
    }

    #[tokio::test]
    async fn opens_then_lists() {
        let container = Arc::new(MemoryContainer::new("thumbnails"));
        container.insert("cat.png", "png");
        let accessor = ContainerAccessor::new(container.clone());

        let listing = ListingAggregator::default()
            .open_and_aggregate(&accessor)
            .await
            .unwrap();

        assert_eq!(listing, vec!["cat.png"]);
        assert_eq!(container.create_calls(), 1);
    }
}
