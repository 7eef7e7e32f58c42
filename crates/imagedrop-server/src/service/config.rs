use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use imagedrop_storage::{AccountCredentials, BlobServiceClient, BlobServiceConfig};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::service::{Error, Result, TransferPolicy};

/// Default values for configuration options.
mod defaults {
    use std::path::PathBuf;

    /// Default number of blob names requested per listing page.
    pub const LIST_PAGE_SIZE: u32 = 10;

    /// Default deadline for a complete listing in seconds.
    pub const LIST_TIMEOUT_SECS: u64 = 50;

    /// Default timeout of a single storage request in seconds.
    pub const STORAGE_REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Default landing page the upload endpoint redirects to.
    pub const LANDING_PAGE: &str = "/index.html";

    /// Default maximum size of one uploaded file: 50 MiB.
    pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

    /// Default maximum size of one upload request: 100 MiB.
    pub const MAX_REQUEST_SIZE: usize = 100 * 1024 * 1024;

    /// Default directory uploaded files are staged in.
    pub fn staging_dir() -> PathBuf {
        "images".into()
    }
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[must_use = "config does nothing unless you use it"]
#[builder(
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct ServiceConfig {
    /// Storage account name.
    pub account_name: String,

    /// Base64 storage account key.
    #[serde(skip_serializing)]
    pub account_key: String,

    /// Container holding the thumbnails that `/list` enumerates.
    pub thumbnail_container: String,

    /// Container uploaded images are transferred to.
    pub image_container: String,

    /// Blob service endpoint override (for example an Azurite emulator).
    #[builder(default)]
    pub storage_endpoint: Option<String>,

    /// Timeout of a single storage request in seconds.
    #[builder(default = "defaults::STORAGE_REQUEST_TIMEOUT_SECS")]
    pub storage_request_timeout_secs: u64,

    /// Number of blob names requested per listing page.
    #[builder(default = "defaults::LIST_PAGE_SIZE")]
    pub list_page_size: u32,

    /// Deadline for a complete listing in seconds.
    #[builder(default = "defaults::LIST_TIMEOUT_SECS")]
    pub list_timeout_secs: u64,

    /// Directory uploaded files are written to before the transfer.
    #[builder(default = "defaults::staging_dir()")]
    pub staging_dir: PathBuf,

    /// Location the upload endpoint redirects to.
    #[builder(default = "defaults::LANDING_PAGE.to_string()")]
    pub landing_page: String,

    /// Whether the upload response waits for the transfers.
    #[builder(default)]
    pub transfer_policy: TransferPolicy,

    /// Maximum size of one uploaded file in bytes.
    #[builder(default = "defaults::MAX_FILE_SIZE")]
    pub max_file_size: usize,

    /// Maximum size of one upload request in bytes.
    #[builder(default = "defaults::MAX_REQUEST_SIZE")]
    pub max_request_size: usize,
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Number of blob names requested per listing page.
    pub fn list_page_size(&self) -> NonZeroU32 {
        NonZeroU32::new(self.list_page_size).unwrap_or(imagedrop_storage::LIST_PAGE_SIZE)
    }

    /// Deadline for a complete listing.
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    /// Builds the blob service client, validating credentials and endpoint.
    pub fn connect_storage(&self) -> Result<BlobServiceClient> {
        let credentials = AccountCredentials::new(&self.account_name, &self.account_key)?;

        let mut config = BlobServiceConfig::default()
            .with_request_timeout(Duration::from_secs(self.storage_request_timeout_secs));

        if let Some(endpoint) = self.storage_endpoint.as_deref() {
            let endpoint = Url::parse(endpoint).map_err(|e| {
                Error::config(format!("invalid storage endpoint '{endpoint}'")).with_source(e)
            })?;
            config = config.with_endpoint(endpoint);
        }

        Ok(BlobServiceClient::new(credentials, config)?)
    }
}

impl ServiceConfigBuilder {
    /// Wrapper for builder validation that returns String errors.
    fn validate(builder: &ServiceConfigBuilder) -> Result<(), String> {
        let required = [
            ("account name", &builder.account_name),
            ("account key", &builder.account_key),
            ("thumbnail container", &builder.thumbnail_container),
            ("image container", &builder.image_container),
        ];

        for (name, value) in required {
            if let Some(value) = value
                && value.trim().is_empty()
            {
                return Err(format!("Storage {name} cannot be empty"));
            }
        }

        if let Some(page_size) = &builder.list_page_size
            && (*page_size == 0 || *page_size > 5000)
        {
            return Err("List page size must be between 1 and 5000".to_string());
        }

        if let Some(timeout_secs) = &builder.list_timeout_secs
            && *timeout_secs == 0
        {
            return Err("List timeout must be at least 1 second".to_string());
        }

        if let Some(landing_page) = &builder.landing_page
            && landing_page.is_empty()
        {
            return Err("Landing page cannot be empty".to_string());
        }

        if let (Some(file), Some(request)) = (&builder.max_file_size, &builder.max_request_size)
            && file > request
        {
            return Err("Maximum file size cannot exceed the maximum request size".to_string());
        }

        Ok(())
    }
}
