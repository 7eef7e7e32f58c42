//! Azure Blob Storage REST client.
//!
//! Only the operations imagedrop needs are implemented: container creation,
//! flat blob listing and block blob uploads. Requests are authorized with the
//! account's Shared Key.

mod container;
mod credentials;
mod signer;
mod xml;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

pub use self::container::AzureContainer;
pub use self::credentials::AccountCredentials;
pub use self::signer::SharedKeySigner;
use crate::error::{Error, Result};

/// Tracing target for Azure requests.
pub(crate) const TRACING_TARGET: &str = "imagedrop_storage::azure";

/// REST API version sent with every request.
pub const API_VERSION: &str = "2021-08-06";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default size of a single uploaded block: 8 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024 * 1024;

/// Configuration for [`BlobServiceClient`].
#[derive(Debug, Clone)]
pub struct BlobServiceConfig {
    /// Service endpoint; defaults to `https://{account}.blob.core.windows.net`.
    pub endpoint: Option<Url>,
    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
    /// User-Agent header to send with requests.
    pub user_agent: String,
    /// Payloads larger than this are uploaded as several blocks.
    pub block_size: usize,
}

impl Default for BlobServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("imagedrop/{}", env!("CARGO_PKG_VERSION")),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl BlobServiceConfig {
    /// Overrides the service endpoint (for example an Azurite emulator).
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the upload block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

pub(crate) struct ClientInner {
    pub http: reqwest::Client,
    pub endpoint: Url,
    pub signer: SharedKeySigner,
    pub block_size: usize,
}

/// Client for one storage account.
///
/// Cheap to clone; every clone shares the same connection pool.
#[derive(Clone)]
pub struct BlobServiceClient {
    inner: Arc<ClientInner>,
}

impl BlobServiceClient {
    /// Creates a client, validating the endpoint up front.
    pub fn new(credentials: AccountCredentials, config: BlobServiceConfig) -> Result<Self> {
        let endpoint = match config.endpoint {
            Some(endpoint) => endpoint,
            None => default_endpoint(credentials.account_name())?,
        };

        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "storage endpoint '{endpoint}' is not an http(s) base url"
            )));
        }

        if config.block_size == 0 {
            return Err(Error::config("upload block size must be positive"));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|err| Error::config("failed to build http client").with_source(err))?;

        tracing::debug!(
            target: TRACING_TARGET,
            account = credentials.account_name(),
            endpoint = %endpoint,
            "blob service client created"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                endpoint,
                signer: SharedKeySigner::new(credentials),
                block_size: config.block_size,
            }),
        })
    }

    /// Service endpoint, without a trailing slash.
    pub fn service_url(&self) -> &str {
        self.inner.endpoint.as_str().trim_end_matches('/')
    }

    /// Storage account name.
    pub fn account_name(&self) -> &str {
        self.inner.signer.account_name()
    }

    /// Returns a client for the named container.
    ///
    /// The name must follow the service's container naming rules.
    pub fn container(&self, name: &str) -> Result<AzureContainer> {
        validate_container_name(name)?;
        AzureContainer::new(self.inner.clone(), name)
    }
}

impl std::fmt::Debug for BlobServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobServiceClient")
            .field("account", &self.account_name())
            .field("endpoint", &self.service_url())
            .finish()
    }
}

fn default_endpoint(account_name: &str) -> Result<Url> {
    let endpoint = format!("https://{account_name}.blob.core.windows.net");
    Url::parse(&endpoint).map_err(|err| {
        Error::config(format!("invalid storage account name '{account_name}'")).with_source(err)
    })
}

/// 3 to 63 characters of lowercase letters, digits and single hyphens,
/// starting and ending with a letter or digit.
fn validate_container_name(name: &str) -> Result<()> {
    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    let valid = (3..=63).contains(&name.len())
        && valid_chars
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");

    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("invalid container name '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::container::BlobContainer;

    fn credentials() -> AccountCredentials {
        AccountCredentials::new("acct", "c2VjcmV0").unwrap()
    }

    #[test]
    fn default_endpoint_uses_account() {
        let client = BlobServiceClient::new(credentials(), BlobServiceConfig::default()).unwrap();
        assert_eq!(client.service_url(), "https://acct.blob.core.windows.net");
        assert_eq!(client.account_name(), "acct");
    }

    #[test]
    fn endpoint_override() {
        let endpoint = Url::parse("http://127.0.0.1:10000/devstoreaccount1").unwrap();
        let config = BlobServiceConfig::default().with_endpoint(endpoint);
        let client = BlobServiceClient::new(credentials(), config).unwrap();
        assert_eq!(client.service_url(), "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let endpoint = Url::parse("mailto:someone@example.com").unwrap();
        let config = BlobServiceConfig::default().with_endpoint(endpoint);
        let err = BlobServiceClient::new(credentials(), config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn container_names_are_validated() {
        let client = BlobServiceClient::new(credentials(), BlobServiceConfig::default()).unwrap();

        assert!(client.container("thumbnails").is_ok());
        assert!(client.container("img-2024").is_ok());
        assert!(client.container("ab").is_err());
        assert!(client.container("Images").is_err());
        assert!(client.container("-images").is_err());
        assert!(client.container("im--ages").is_err());
    }

    #[test]
    fn container_name_is_kept() {
        let client = BlobServiceClient::new(credentials(), BlobServiceConfig::default()).unwrap();
        let container = client.container("images").unwrap();
        assert_eq!(container.name(), "images");
    }
}
