//! XML bodies exchanged with the Blob service.

use serde::{Deserialize, Serialize};

use crate::container::ListSegment;
use crate::error::{Error, Result};

/// Response body of *List Blobs*.
#[derive(Debug, Deserialize)]
struct EnumerationResults {
    #[serde(rename = "Blobs", default)]
    blobs: Option<Blobs>,
    #[serde(rename = "NextMarker", default)]
    next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Blobs {
    #[serde(rename = "Blob", default)]
    blob: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
struct BlobItem {
    #[serde(rename = "Name")]
    name: String,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "Code", default)]
    pub code: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

/// Request body of *Put Block List*.
#[derive(Debug, Serialize)]
#[serde(rename = "BlockList")]
struct BlockList<'a> {
    #[serde(rename = "Latest")]
    latest: &'a [String],
}

fn strip_bom(body: &str) -> &str {
    body.strip_prefix('\u{feff}').unwrap_or(body)
}

/// Decodes a *List Blobs* response into a [`ListSegment`].
pub(crate) fn parse_list_blobs(body: &str) -> Result<ListSegment> {
    let results: EnumerationResults = quick_xml::de::from_str(strip_bom(body))
        .map_err(|err| Error::protocol("failed to decode blob listing").with_source(err))?;

    let keys = results
        .blobs
        .map(|blobs| blobs.blob.into_iter().map(|item| item.name).collect())
        .unwrap_or_default();

    Ok(ListSegment::new(keys, results.next_marker))
}

/// Decodes a service error body; malformed bodies yield `None`.
pub(crate) fn parse_error(body: &str) -> Option<ErrorBody> {
    quick_xml::de::from_str(strip_bom(body)).ok()
}

/// Encodes a *Put Block List* request body.
pub(crate) fn block_list(block_ids: &[String]) -> Result<String> {
    let body = quick_xml::se::to_string(&BlockList { latest: block_ids })
        .map_err(|err| Error::protocol("failed to encode block list").with_source(err))?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_with_marker() {
        let body = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <EnumerationResults ServiceEndpoint=\"https://acct.blob.core.windows.net/\" ContainerName=\"thumbnails\">\
            <MaxResults>2</MaxResults>\
            <Blobs>\
            <Blob><Name>a.png</Name><Properties><Content-Length>3</Content-Length></Properties></Blob>\
            <Blob><Name>b.png</Name><Properties><Content-Length>5</Content-Length></Properties></Blob>\
            </Blobs>\
            <NextMarker>2!72!MDAwMDA</NextMarker>\
            </EnumerationResults>";

        let segment = parse_list_blobs(body).unwrap();
        assert_eq!(segment.keys, vec!["a.png", "b.png"]);
        assert_eq!(segment.next_marker.as_deref(), Some("2!72!MDAwMDA"));
    }

    #[test]
    fn empty_marker_ends_listing() {
        let body = "<EnumerationResults ContainerName=\"thumbnails\">\
            <Blobs><Blob><Name>c.png</Name></Blob></Blobs>\
            <NextMarker/>\
            </EnumerationResults>";

        let segment = parse_list_blobs(body).unwrap();
        assert_eq!(segment.keys, vec!["c.png"]);
        assert!(!segment.has_more());
    }

    #[test]
    fn empty_container() {
        let body = "<EnumerationResults ContainerName=\"thumbnails\">\
            <Blobs/><NextMarker/>\
            </EnumerationResults>";

        let segment = parse_list_blobs(body).unwrap();
        assert!(segment.keys.is_empty());
        assert!(!segment.has_more());
    }

    #[test]
    fn garbage_is_protocol_error() {
        let err = parse_list_blobs("not xml at all <").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
    }

    #[test]
    fn parses_error_body() {
        let body = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <Error><Code>ContainerAlreadyExists</Code>\
            <Message>The specified container already exists.</Message></Error>";

        let error = parse_error(body).unwrap();
        assert_eq!(error.code.as_deref(), Some("ContainerAlreadyExists"));
        assert_eq!(
            error.message.as_deref(),
            Some("The specified container already exists.")
        );
    }

    #[test]
    fn encodes_block_list() {
        let body = block_list(&["MDAwMDA=".to_owned(), "MDAwMDE=".to_owned()]).unwrap();
        assert!(body.ends_with(
            "<BlockList><Latest>MDAwMDA=</Latest><Latest>MDAwMDE=</Latest></BlockList>"
        ));
    }
}
