//! Storage and upload configuration.
//!
//! Storage settings keep the `AzureStorageConfig__*` environment names so an
//! existing deployment can be pointed at this server unchanged.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use imagedrop_server::service::{ServiceConfig, TransferPolicy};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Blob storage account and container settings.
#[derive(Clone, Args, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage account name.
    #[arg(long = "account-name", env = "AzureStorageConfig__AccountName")]
    pub account_name: String,

    /// Base64 storage account key.
    #[arg(long = "account-key", env = "AzureStorageConfig__AccountKey", hide_env_values = true)]
    #[serde(skip_serializing, default)]
    pub account_key: String,

    /// Container listed by `/list`.
    #[arg(long, env = "AzureStorageConfig__ThumbnailContainer")]
    pub thumbnail_container: String,

    /// Container uploads are transferred to.
    #[arg(long, env = "AzureStorageConfig__ImageContainer")]
    pub image_container: String,

    /// Blob service endpoint, for example an Azurite emulator.
    ///
    /// Defaults to `https://{account}.blob.core.windows.net`.
    #[arg(long = "storage-endpoint", env = "AzureStorageConfig__Endpoint")]
    pub endpoint: Option<String>,

    /// Timeout of a single storage request in seconds.
    #[arg(long, env = "STORAGE_REQUEST_TIMEOUT", default_value_t = 60)]
    pub storage_request_timeout: u64,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("thumbnail_container", &self.thumbnail_container)
            .field("image_container", &self.image_container)
            .field("endpoint", &self.endpoint)
            .field("storage_request_timeout", &self.storage_request_timeout)
            .finish()
    }
}

/// Listing and upload settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Number of blob names requested per listing page (1-5000).
    #[arg(long, env = "LIST_PAGE_SIZE", default_value_t = 10)]
    pub list_page_size: u32,

    /// Deadline for a complete listing in seconds.
    #[arg(long, env = "LIST_TIMEOUT", default_value_t = 50)]
    pub list_timeout: u64,

    /// Directory uploaded files are staged in.
    #[arg(long, env = "STAGING_DIR", default_value = "images")]
    pub staging_dir: PathBuf,

    /// Location the upload endpoint redirects to.
    #[arg(long, env = "LANDING_PAGE", default_value = "/index.html")]
    pub landing_page: String,

    /// Whether the upload response waits for its transfers.
    #[arg(long, env = "TRANSFER_POLICY", value_enum, default_value_t = TransferPolicy::Detach)]
    pub transfer_policy: TransferPolicy,

    /// Maximum size of one uploaded file in bytes.
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = 50 * 1024 * 1024)]
    pub max_file_size: usize,

    /// Maximum size of one upload request in bytes.
    #[arg(long, env = "MAX_REQUEST_SIZE", default_value_t = 100 * 1024 * 1024)]
    pub max_request_size: usize,
}

impl StorageConfig {
    /// Logs storage configuration at info level, without the account key.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            account = %self.account_name,
            endpoint = self.endpoint.as_deref().unwrap_or("default"),
            thumbnails = %self.thumbnail_container,
            images = %self.image_container,
            request_timeout_secs = self.storage_request_timeout,
            "Storage configuration"
        );
    }
}

impl UploadConfig {
    /// Logs upload configuration at info level.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            list_page_size = self.list_page_size,
            list_timeout_secs = self.list_timeout,
            staging_dir = %self.staging_dir.display(),
            landing_page = %self.landing_page,
            transfer_policy = ?self.transfer_policy,
            max_file_size = self.max_file_size,
            max_request_size = self.max_request_size,
            "Upload configuration"
        );
    }
}

/// Builds the service configuration from the storage and upload settings.
pub fn service_config(
    storage: &StorageConfig,
    upload: &UploadConfig,
) -> anyhow::Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .with_account_name(storage.account_name.clone())
        .with_account_key(storage.account_key.clone())
        .with_thumbnail_container(storage.thumbnail_container.clone())
        .with_image_container(storage.image_container.clone())
        .with_storage_request_timeout_secs(storage.storage_request_timeout)
        .with_list_page_size(upload.list_page_size)
        .with_list_timeout_secs(upload.list_timeout)
        .with_staging_dir(upload.staging_dir.clone())
        .with_landing_page(upload.landing_page.clone())
        .with_transfer_policy(upload.transfer_policy)
        .with_max_file_size(upload.max_file_size)
        .with_max_request_size(upload.max_request_size);

    if let Some(endpoint) = storage.endpoint.clone() {
        builder = builder.with_storage_endpoint(endpoint);
    }

    builder.build().context("invalid service configuration")
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        storage: StorageConfig,
        #[clap(flatten)]
        upload: UploadConfig,
    }

    fn parse(args: &[&str]) -> TestCli {
        let base = [
            "imagedrop",
            "--account-name",
            "account",
            "--account-key",
            "c2VjcmV0",
            "--thumbnail-container",
            "thumbnails",
            "--image-container",
            "images",
        ];
        TestCli::parse_from(base.iter().chain(args))
    }

    #[test]
    fn defaults_build_a_service_config() {
        let cli = parse(&[]);
        let config = service_config(&cli.storage, &cli.upload).unwrap();

        assert_eq!(config.list_page_size, 10);
        assert_eq!(config.list_timeout_secs, 50);
        assert_eq!(config.staging_dir, PathBuf::from("images"));
        assert_eq!(config.landing_page, "/index.html");
        assert_eq!(config.transfer_policy, TransferPolicy::Detach);
        assert_eq!(config.storage_endpoint, None);
    }

    #[test]
    fn parses_overrides() {
        let cli = parse(&[
            "--transfer-policy",
            "wait",
            "--storage-endpoint",
            "http://127.0.0.1:10000/devstoreaccount1",
            "--list-page-size",
            "25",
        ]);
        let config = service_config(&cli.storage, &cli.upload).unwrap();

        assert_eq!(config.transfer_policy, TransferPolicy::Wait);
        assert_eq!(config.list_page_size, 25);
        assert_eq!(
            config.storage_endpoint.as_deref(),
            Some("http://127.0.0.1:10000/devstoreaccount1")
        );
    }

    #[test]
    fn rejects_invalid_page_size() {
        let cli = parse(&["--list-page-size", "0"]);
        assert!(service_config(&cli.storage, &cli.upload).is_err());
    }

    #[test]
    fn debug_redacts_account_key() {
        let cli = parse(&[]);
        let debug = format!("{:?}", cli.storage);
        assert!(!debug.contains("c2VjcmV0"));
    }
}
