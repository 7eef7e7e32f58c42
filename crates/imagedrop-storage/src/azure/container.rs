//! Container operations over the Blob service REST API.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use tokio::io::AsyncReadExt;
use url::Url;

use super::{API_VERSION, ClientInner, TRACING_TARGET, xml};
use crate::container::{BlobContainer, ListSegment, PutOutput};
use crate::error::{Error, Result};

const BLOB_TYPE: &str = "x-ms-blob-type";
const BLOB_CONTENT_TYPE: &str = "x-ms-blob-content-type";

/// A container in an Azure storage account.
#[derive(Clone)]
pub struct AzureContainer {
    inner: Arc<ClientInner>,
    name: String,
    url: Url,
}

impl AzureContainer {
    pub(crate) fn new(inner: Arc<ClientInner>, name: &str) -> Result<Self> {
        let mut url = inner.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| Error::config("storage endpoint cannot be a base url"))?
            .pop_if_empty()
            .push(name);

        Ok(Self {
            inner,
            name: name.to_owned(),
            url,
        })
    }

    /// Container URL, e.g. `https://acct.blob.core.windows.net/images`.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn blob_url(&self, blob_name: &str) -> Result<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::config("storage endpoint cannot be a base url"))?
            .push(blob_name);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Response> {
        let mut builder = self
            .inner
            .http
            .request(method, url)
            .headers(headers)
            .header("x-ms-date", http_date())
            .header("x-ms-version", API_VERSION);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let mut request = builder.build()?;
        self.inner.signer.authorize(&mut request)?;

        let response = self.inner.http.execute(request).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        Err(status_error(response).await)
    }

    async fn put_blob(&self, blob_name: &str, data: Bytes) -> Result<PutOutput> {
        let mut headers = HeaderMap::new();
        headers.insert(BLOB_TYPE, HeaderValue::from_static("BlockBlob"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type(blob_name)));

        let size = data.len() as u64;
        let response = self
            .send(Method::PUT, self.blob_url(blob_name)?, headers, Some(data))
            .await?;

        Ok(put_output(&response, size))
    }

    async fn put_block(&self, blob_name: &str, block_id: &str, data: Bytes) -> Result<()> {
        let mut url = self.blob_url(blob_name)?;
        url.query_pairs_mut()
            .append_pair("comp", "block")
            .append_pair("blockid", block_id);

        tracing::trace!(
            target: TRACING_TARGET,
            blob = blob_name,
            block_id,
            size = data.len(),
            "uploading block"
        );

        self.send(Method::PUT, url, HeaderMap::new(), Some(data)).await?;
        Ok(())
    }

    async fn put_block_list(
        &self,
        blob_name: &str,
        block_ids: &[String],
        size: u64,
    ) -> Result<PutOutput> {
        let mut url = self.blob_url(blob_name)?;
        url.query_pairs_mut().append_pair("comp", "blocklist");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        headers.insert(
            BLOB_CONTENT_TYPE,
            HeaderValue::from_static(content_type(blob_name)),
        );

        let body = Bytes::from(xml::block_list(block_ids)?);
        let response = self.send(Method::PUT, url, headers, Some(body)).await?;

        Ok(put_output(&response, size))
    }
}

#[async_trait::async_trait]
impl BlobContainer for AzureContainer {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(name = "azure.create_container", skip(self), fields(container = %self.name))]
    async fn create(&self) -> Result<()> {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("restype", "container");

        self.send(Method::PUT, url, HeaderMap::new(), Some(Bytes::new()))
            .await?;
        Ok(())
    }

    #[tracing::instrument(
        name = "azure.list_blobs",
        skip(self),
        fields(container = %self.name, max_results = max_results.get())
    )]
    async fn list_segment(
        &self,
        marker: Option<&str>,
        max_results: NonZeroU32,
    ) -> Result<ListSegment> {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("maxresults", &max_results.to_string());
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }

        let response = self.send(Method::GET, url, HeaderMap::new(), None).await?;
        let body = response.text().await?;
        let segment = xml::parse_list_blobs(&body)?;

        tracing::debug!(
            target: TRACING_TARGET,
            blobs = segment.keys.len(),
            has_more = segment.has_more(),
            "listed blob page"
        );

        Ok(segment)
    }

    #[tracing::instrument(
        name = "azure.put_blob",
        skip(self, data),
        fields(container = %self.name, size = data.len())
    )]
    async fn put_block_blob(&self, blob_name: &str, data: Bytes) -> Result<PutOutput> {
        let block_size = self.inner.block_size;
        if data.len() <= block_size {
            return self.put_blob(blob_name, data).await;
        }

        let size = data.len() as u64;
        let mut block_ids = Vec::with_capacity(data.len().div_ceil(block_size));
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + block_size).min(data.len());
            let block_id = block_id(block_ids.len());
            self.put_block(blob_name, &block_id, data.slice(offset..end))
                .await?;
            block_ids.push(block_id);
            offset = end;
        }

        self.put_block_list(blob_name, &block_ids, size).await
    }

    #[tracing::instrument(
        name = "azure.upload_file",
        skip(self, path),
        fields(container = %self.name, path = %path.display())
    )]
    async fn upload_file(&self, blob_name: &str, path: &Path) -> Result<PutOutput> {
        let read_error = |err: std::io::Error| {
            Error::io(format!("failed to read '{}'", path.display())).with_source(err)
        };

        let mut file = tokio::fs::File::open(path).await.map_err(read_error)?;
        let size = file.metadata().await.map_err(read_error)?.len();
        let block_size = self.inner.block_size;

        if size <= block_size as u64 {
            let mut data = Vec::with_capacity(size as usize);
            file.read_to_end(&mut data).await.map_err(read_error)?;
            return self.put_blob(blob_name, Bytes::from(data)).await;
        }

        let mut block_ids = Vec::new();
        let mut uploaded = 0u64;
        loop {
            let mut chunk = Vec::with_capacity(block_size);
            (&mut file)
                .take(block_size as u64)
                .read_to_end(&mut chunk)
                .await
                .map_err(read_error)?;
            if chunk.is_empty() {
                break;
            }

            uploaded += chunk.len() as u64;
            let block_id = block_id(block_ids.len());
            self.put_block(blob_name, &block_id, Bytes::from(chunk)).await?;
            block_ids.push(block_id);
        }

        self.put_block_list(blob_name, &block_ids, uploaded).await
    }
}

impl std::fmt::Debug for AzureContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureContainer")
            .field("name", &self.name)
            .field("url", &self.url.as_str())
            .finish()
    }
}

/// Block ids must all have the same length within one blob.
fn block_id(index: usize) -> String {
    STANDARD.encode(format!("{index:08}"))
}

fn http_date() -> String {
    jiff::Timestamp::now()
        .strftime("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn content_type(blob_name: &str) -> &'static str {
    let extension = blob_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn put_output(response: &Response, size: u64) -> PutOutput {
    PutOutput {
        status: response.status().as_u16(),
        e_tag: response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned),
        size,
    }
}

async fn status_error(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let detail = xml::parse_error(&body);
    let code = detail.as_ref().and_then(|detail| detail.code.clone());
    let message = detail
        .and_then(|detail| detail.message)
        .map(|message| message.lines().next().unwrap_or_default().to_owned())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());

    let message = match code {
        Some(code) => format!("{code}: {message}"),
        None => message,
    };

    tracing::debug!(
        target: TRACING_TARGET,
        status = status.as_u16(),
        message = %message,
        "storage request rejected"
    );

    let error = if status == StatusCode::CONFLICT {
        Error::conflict(message)
    } else {
        Error::transport(message)
    };
    error.with_status(status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ids_have_fixed_length() {
        let first = block_id(0);
        let last = block_id(12_345);
        assert_eq!(first.len(), last.len());
        assert_eq!(STANDARD.decode(&first).unwrap(), b"00000000");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type("cat.PNG"), "image/png");
        assert_eq!(content_type("dog.jpeg"), "image/jpeg");
        assert_eq!(content_type("notes"), "application/octet-stream");
    }

    #[test]
    fn http_date_is_rfc1123() {
        let date = http_date();
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), "Sun, 18 Oct 2026 10:00:00 GMT".len());
    }
}
