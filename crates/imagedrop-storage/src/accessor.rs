//! Lazy container creation.

use std::fmt;
use std::sync::Arc;

use derive_more::Deref;

use crate::TRACING_TARGET;
use crate::container::BlobContainer;
use crate::error::{ErrorKind, Result};

/// A container that is known to exist.
///
/// Only [`ContainerAccessor::open`] hands these out.
#[derive(Clone, Deref)]
pub struct ContainerHandle(Arc<dyn BlobContainer>);

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContainerHandle").field(&self.0.name()).finish()
    }
}

/// Produces [`ContainerHandle`]s, creating the container on first use.
///
/// Creation is idempotent from the caller's point of view: a container that
/// already exists yields the same usable handle as a freshly created one.
#[derive(Clone)]
pub struct ContainerAccessor {
    container: Arc<dyn BlobContainer>,
}

impl ContainerAccessor {
    /// Wraps a container client.
    pub fn new(container: Arc<dyn BlobContainer>) -> Self {
        Self { container }
    }

    /// Name of the underlying container.
    pub fn container_name(&self) -> &str {
        self.container.name()
    }

    /// Ensures the container exists and returns a handle to it.
    ///
    /// Performs one create call. A conflict means the container is already
    /// there and counts as success; every other failure yields no handle.
    #[tracing::instrument(name = "container.open", skip(self), fields(container = %self.container.name()))]
    pub async fn open(&self) -> Result<ContainerHandle> {
        match self.container.create().await {
            Ok(()) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    container = %self.container.name(),
                    "container created"
                );
            }
            Err(err) if err.kind() == ErrorKind::Conflict => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    container = %self.container.name(),
                    "container already exists"
                );
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    container = %self.container.name(),
                    error = %err,
                    status = ?err.status(),
                    "failed to create container"
                );
                return Err(err);
            }
        }

        Ok(ContainerHandle(self.container.clone()))
    }
}

impl fmt::Debug for ContainerAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerAccessor")
            .field("container", &self.container.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::MemoryContainer;

    #[tokio::test]
    async fn open_creates_missing_container() {
        let container = Arc::new(MemoryContainer::new("images"));
        let accessor = ContainerAccessor::new(container.clone());

        let handle = accessor.open().await.unwrap();
        assert_eq!(handle.name(), "images");
        assert!(container.exists());
        assert_eq!(container.create_calls(), 1);
    }

    #[tokio::test]
    async fn open_tolerates_existing_container() {
        let container = Arc::new(MemoryContainer::new("images"));
        let accessor = ContainerAccessor::new(container.clone());

        let first = accessor.open().await.unwrap();
        let second = accessor.open().await.unwrap();

        assert_eq!(first.name(), second.name());
        assert_eq!(container.create_calls(), 2);
    }

    #[tokio::test]
    async fn open_fails_on_other_errors() {
        let container = Arc::new(MemoryContainer::new("images"));
        container.fail_create(Error::transport("forbidden").with_status(403));
        let accessor = ContainerAccessor::new(container.clone());

        let err = accessor.open().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), Some(403));
    }
}
