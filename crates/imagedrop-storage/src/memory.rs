//! In-process [`BlobContainer`] for tests and local development.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::num::NonZeroU32;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use crate::container::{BlobContainer, ListSegment, PutOutput};
use crate::error::{Error, Result};

/// A single recorded `list_segment` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCall {
    /// Marker the caller passed.
    pub marker: Option<String>,
    /// Page size the caller requested.
    pub max_results: u32,
}

#[derive(Default)]
struct State {
    exists: bool,
    blobs: BTreeMap<String, Bytes>,
    scripted_pages: Option<VecDeque<ListSegment>>,
    list_failures: HashMap<usize, Error>,
    create_failure: Option<Error>,
    put_failures: HashMap<String, Error>,
    list_calls: Vec<ListCall>,
    create_calls: usize,
}

/// Blob container kept entirely in memory.
///
/// Without scripted pages, listings page through the stored blobs in name
/// order and use the first name of the next page as the continuation marker.
/// Scripted pages, injected failures and call recording make it usable as a
/// test double for the listing and upload paths.
pub struct MemoryContainer {
    name: String,
    create_delay: Option<Duration>,
    list_delay: Option<Duration>,
    state: Mutex<State>,
}

impl MemoryContainer {
    /// Creates an empty container that does not exist yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            create_delay: None,
            list_delay: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Marks the container as already existing.
    pub fn existing(self) -> Self {
        self.lock().exists = true;
        self
    }

    /// Serves these pages, in order, instead of paging stored blobs.
    pub fn with_pages(self, pages: impl IntoIterator<Item = ListSegment>) -> Self {
        self.lock().scripted_pages = Some(pages.into_iter().collect());
        self
    }

    /// Delays every `create` call.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Delays every `list_segment` call.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Stores a blob directly, bypassing [`BlobContainer::put_block_blob`].
    pub fn insert(&self, blob_name: impl Into<String>, data: impl Into<Bytes>) {
        self.lock().blobs.insert(blob_name.into(), data.into());
    }

    /// Fails the `call`-th (zero-based) `list_segment` call with `error`.
    pub fn fail_list_at(&self, call: usize, error: Error) {
        self.lock().list_failures.insert(call, error);
    }

    /// Fails the next `create` call with `error`.
    pub fn fail_create(&self, error: Error) {
        self.lock().create_failure = Some(error);
    }

    /// Fails the next upload of `blob_name` with `error`.
    pub fn fail_put(&self, blob_name: impl Into<String>, error: Error) {
        self.lock().put_failures.insert(blob_name.into(), error);
    }

    /// Whether the container has been created.
    pub fn exists(&self) -> bool {
        self.lock().exists
    }

    /// Contents of a stored blob.
    pub fn blob(&self, blob_name: &str) -> Option<Bytes> {
        self.lock().blobs.get(blob_name).cloned()
    }

    /// Names of all stored blobs, in name order.
    pub fn blob_names(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    /// Every `list_segment` call received so far.
    pub fn list_calls(&self) -> Vec<ListCall> {
        self.lock().list_calls.clone()
    }

    /// Number of `create` calls received so far.
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn page_from_blobs(
        blobs: &BTreeMap<String, Bytes>,
        marker: Option<&str>,
        max: usize,
    ) -> ListSegment {
        let start = marker.map_or(Bound::Unbounded, Bound::Included);
        let mut names = blobs
            .range::<str, _>((start, Bound::Unbounded))
            .map(|(name, _)| name.clone());

        let keys: Vec<String> = names.by_ref().take(max).collect();
        ListSegment::new(keys, names.next())
    }
}

#[async_trait::async_trait]
impl BlobContainer for MemoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<()> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.create_calls += 1;

        if let Some(error) = state.create_failure.take() {
            return Err(error);
        }

        if state.exists {
            return Err(
                Error::conflict(format!("container '{}' already exists", self.name))
                    .with_status(409),
            );
        }

        state.exists = true;
        Ok(())
    }

    async fn list_segment(
        &self,
        marker: Option<&str>,
        max_results: NonZeroU32,
    ) -> Result<ListSegment> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        let call = state.list_calls.len();
        state.list_calls.push(ListCall {
            marker: marker.map(str::to_owned),
            max_results: max_results.get(),
        });

        if let Some(error) = state.list_failures.remove(&call) {
            return Err(error);
        }

        if let Some(pages) = state.scripted_pages.as_mut() {
            return pages.pop_front().ok_or_else(|| {
                Error::transport("no scripted page left for this request").with_status(400)
            });
        }

        Ok(Self::page_from_blobs(
            &state.blobs,
            marker,
            max_results.get() as usize,
        ))
    }

    async fn put_block_blob(&self, blob_name: &str, data: Bytes) -> Result<PutOutput> {
        let mut state = self.lock();

        if let Some(error) = state.put_failures.remove(blob_name) {
            return Err(error);
        }

        let size = data.len() as u64;
        state.blobs.insert(blob_name.to_owned(), data);

        Ok(PutOutput {
            status: 201,
            e_tag: Some(format!("\"{:x}\"", state.blobs.len())),
            size,
        })
    }
}
