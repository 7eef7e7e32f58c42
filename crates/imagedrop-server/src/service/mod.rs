//! Application state and dependency injection.

mod config;
mod staging;
mod transfer;

use std::sync::Arc;

use derive_more::Display;
use imagedrop_storage::{BlobContainer, ContainerAccessor, ListingAggregator};

pub use crate::service::config::{ServiceConfig, ServiceConfigBuilder};
pub use crate::service::staging::{
    StagedFile, StagedWriter, StagingArea, StagingError, sanitize_file_name,
};
pub use crate::service::transfer::{
    TransferBatch, TransferPolicy, TransferService, TransferSummary,
};
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Tracing target for service state construction.
const TRACING_TARGET: &str = "imagedrop_server::service";

/// Lists the thumbnail container as full blob URLs.
#[derive(Debug, Clone)]
pub struct BlobListing {
    container: ContainerAccessor,
    aggregator: ListingAggregator,
}

impl BlobListing {
    /// Creates a listing over `container` using `aggregator`.
    pub fn new(container: ContainerAccessor, aggregator: ListingAggregator) -> Self {
        Self {
            container,
            aggregator,
        }
    }

    /// Name of the listed container.
    pub fn container_name(&self) -> &str {
        self.container.container_name()
    }

    /// Ensures the container exists, then lists every blob in it.
    ///
    /// The listing timeout also covers the container creation.
    pub async fn list(&self) -> imagedrop_storage::Result<Vec<String>> {
        self.aggregator.open_and_aggregate(&self.container).await
    }
}

/// Location the upload endpoint redirects to.
#[derive(Debug, Clone, Display)]
pub struct LandingPage(Arc<str>);

impl LandingPage {
    /// Creates a landing page location.
    pub fn new(location: &str) -> Self {
        Self(Arc::from(location))
    }

    /// Location as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    // External services:
    pub listing: BlobListing,
    pub transfers: TransferService,

    // Internal services:
    pub staging: StagingArea,
    pub landing_page: LandingPage,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Builds the storage client and prepares the staging directory. No
    /// request is sent to the storage service here; containers are created
    /// on first use.
    pub async fn new(config: &ServiceConfig) -> Result<Self> {
        let client = config.connect_storage()?;
        let thumbnails = client.container(&config.thumbnail_container)?;
        let images = client.container(&config.image_container)?;

        tracing::info!(
            target: TRACING_TARGET,
            account = client.account_name(),
            endpoint = client.service_url(),
            thumbnails = %config.thumbnail_container,
            images = %config.image_container,
            "storage configured"
        );

        Self::with_containers(
            config,
            client.service_url(),
            Arc::new(thumbnails),
            Arc::new(images),
        )
        .await
    }

    /// Initializes application state over arbitrary containers.
    ///
    /// Listed names are prefixed with `{service_url}/{container}/`.
    pub async fn with_containers(
        config: &ServiceConfig,
        service_url: &str,
        thumbnails: Arc<dyn BlobContainer>,
        images: Arc<dyn BlobContainer>,
    ) -> Result<Self> {
        let aggregator = ListingAggregator::new(config.list_page_size())
            .with_url_prefix(service_url, thumbnails.name())
            .with_timeout(config.list_timeout());

        let staging = StagingArea::new(&config.staging_dir, config.max_file_size);
        staging.prepare().await.map_err(|e| {
            Error::file_system(format!(
                "failed to create staging directory '{}'",
                config.staging_dir.display()
            ))
            .with_source(e)
        })?;

        Ok(Self {
            listing: BlobListing::new(ContainerAccessor::new(thumbnails), aggregator),
            transfers: TransferService::new(
                ContainerAccessor::new(images),
                config.transfer_policy,
            ),

            staging,
            landing_page: LandingPage::new(&config.landing_page),
        })
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// External services:
impl_di!(listing: BlobListing);
impl_di!(transfers: TransferService);

// Internal services:
impl_di!(staging: StagingArea);
impl_di!(landing_page: LandingPage);
