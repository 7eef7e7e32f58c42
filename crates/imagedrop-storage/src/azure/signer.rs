//! Shared Key request authorization.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, Request};
use sha2::Sha256;
use url::Url;

use super::credentials::AccountCredentials;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Standard headers that take part in the string to sign, in order.
const SIGNED_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// Signs requests with the storage account key.
#[derive(Debug, Clone)]
pub struct SharedKeySigner {
    credentials: AccountCredentials,
}

impl SharedKeySigner {
    /// Creates a signer for the given account.
    pub fn new(credentials: AccountCredentials) -> Self {
        Self { credentials }
    }

    /// Account the signer authorizes requests for.
    pub fn account_name(&self) -> &str {
        self.credentials.account_name()
    }

    /// Adds the `Authorization` header to a fully built request.
    ///
    /// All `x-ms-*` headers must already be present.
    pub fn authorize(&self, request: &mut Request) -> Result<()> {
        let content_length = request
            .body()
            .and_then(|body| body.as_bytes())
            .map_or(0, <[u8]>::len);

        let string_to_sign =
            self.string_to_sign(request.method(), request.url(), request.headers(), content_length);
        let signature = self.signature(&string_to_sign)?;

        let value = format!("SharedKey {}:{}", self.account_name(), signature);
        let value = HeaderValue::from_str(&value)
            .map_err(|err| Error::config("invalid authorization header").with_source(err))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Builds the canonical string that is signed for a request.
    pub fn string_to_sign(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        content_length: usize,
    ) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(method.as_str());
        out.push('\n');

        for name in SIGNED_HEADERS {
            if name == "content-length" {
                if content_length > 0 {
                    out.push_str(&content_length.to_string());
                }
            } else if let Some(value) = header_str(headers, name) {
                out.push_str(value);
            }
            out.push('\n');
        }

        out.push_str(&canonicalized_headers(headers));
        out.push_str(&self.canonicalized_resource(url));
        out
    }

    fn signature(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.account_key())
            .map_err(|err| Error::config("invalid storage account key").with_source(err))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn canonicalized_resource(&self, url: &Url) -> String {
        let mut resource = format!("/{}{}", self.account_name(), url.path());

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            params
                .entry(name.to_lowercase())
                .or_default()
                .push(value.into_owned());
        }

        for (name, mut values) in params {
            values.sort();
            resource.push('\n');
            resource.push_str(&name);
            resource.push(':');
            resource.push_str(&values.join(","));
        }

        resource
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms_headers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, value) in headers {
        if !name.as_str().starts_with("x-ms-") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            ms_headers.entry(name.as_str()).or_default().push(value.trim());
        }
    }

    let mut out = String::new();
    for (name, values) in ms_headers {
        out.push_str(name);
        out.push(':');
        out.push_str(&values.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use reqwest::header::CONTENT_TYPE;

    use super::*;

    fn signer() -> SharedKeySigner {
        let credentials = AccountCredentials::new("acct", "c2VjcmV0").unwrap();
        SharedKeySigner::new(credentials)
    }

    fn ms_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-version", HeaderValue::from_static("2021-08-06"));
        headers.insert(
            "x-ms-date",
            HeaderValue::from_static("Sun, 18 Oct 2026 10:00:00 GMT"),
        );
        headers
    }

    #[test]
    fn string_to_sign_for_listing() {
        let url = Url::parse(
            "https://acct.blob.core.windows.net/thumbnails?restype=container&comp=list&maxresults=10&marker=m1",
        )
        .unwrap();

        let string_to_sign = signer().string_to_sign(&Method::GET, &url, &ms_headers(), 0);

        let expected = "GET\n\n\n\n\n\n\n\n\n\n\n\n\
            x-ms-date:Sun, 18 Oct 2026 10:00:00 GMT\n\
            x-ms-version:2021-08-06\n\
            /acct/thumbnails\n\
            comp:list\n\
            marker:m1\n\
            maxresults:10\n\
            restype:container";
        assert_eq!(string_to_sign, expected);
    }

    #[test]
    fn string_to_sign_includes_length_and_type() {
        let url = Url::parse("https://acct.blob.core.windows.net/images/cat.jpg").unwrap();
        let mut headers = ms_headers();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));

        let string_to_sign = signer().string_to_sign(&Method::PUT, &url, &headers, 4);

        let expected = "PUT\n\n\n4\n\nimage/jpeg\n\n\n\n\n\n\n\
            x-ms-blob-type:BlockBlob\n\
            x-ms-date:Sun, 18 Oct 2026 10:00:00 GMT\n\
            x-ms-version:2021-08-06\n\
            /acct/images/cat.jpg";
        assert_eq!(string_to_sign, expected);
    }

    #[test]
    fn authorize_adds_shared_key_header() {
        let url = Url::parse("https://acct.blob.core.windows.net/images?restype=container").unwrap();
        let mut request = Request::new(Method::PUT, url);
        *request.headers_mut() = ms_headers();

        signer().authorize(&mut request).unwrap();

        let header = request.headers()[AUTHORIZATION].to_str().unwrap();
        let signature = header.strip_prefix("SharedKey acct:").unwrap();
        assert_eq!(STANDARD.decode(signature).unwrap().len(), 32);
    }

    #[test]
    fn signature_depends_on_key() {
        let other = SharedKeySigner::new(AccountCredentials::new("acct", "b3RoZXI=").unwrap());
        let first = signer().signature("GET\n").unwrap();
        let second = other.signature("GET\n").unwrap();

        assert_ne!(first, second);
        assert_eq!(first, signer().signature("GET\n").unwrap());
    }
}
