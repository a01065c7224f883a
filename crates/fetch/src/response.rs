//! Framework-neutral request and response types.
//!
//! The HTTP server converts to and from these at its edge; everything below
//! deals only in headers, a status and a byte stream.

use bytes::Bytes;
use futures::Stream;
use futures::io::AsyncRead;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, VARY};
use reqwest::{Method, StatusCode};
use skycache_compress::Accepted;
use skycache_storage::Resolved;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::Result as IoResult;
use std::pin::Pin;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::io::ReaderStream;

/// A streaming response body. An `Err` item aborts the stream; whatever was
/// yielded before it has already been sent.
pub type Body = Pin<Box<dyn Stream<Item = IoResult<Bytes>> + Send>>;

/// An inbound request for an asset.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub method: Method,
    /// Asset path relative to the cache root, as requested (not yet validated)
    pub path: String,
    /// Raw query string, without the `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl AssetRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
        }
    }

    /// Add a header (builder style).
    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Encodings the client is willing to receive.
    pub fn accepted(&self) -> Accepted {
        Accepted::from_header(self.headers.get(ACCEPT_ENCODING).and_then(|v| v.to_str().ok()))
    }
}

/// An outbound response: status, headers and a body that is streamed to the
/// client as it is produced.
pub struct AssetResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Debug for AssetResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AssetResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl AssetResponse {
    /// A response for a cache hit. `reader` must already be decoded if
    /// `resolved.decompress` is set.
    pub fn cached<R>(resolved: &Resolved, reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&resolved.content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        if let Some(encoding) = resolved.content_encoding() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        if let Some(length) = resolved.content_length() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
        Self {
            status: StatusCode::OK,
            headers,
            body: reader_body(reader),
        }
    }

    /// Collect the whole body. Meant for tests and small responses.
    pub async fn into_bytes(self) -> IoResult<Vec<u8>> {
        use futures::TryStreamExt;
        self.body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }
}

/// Stream a runtime-agnostic reader as a response body.
pub fn reader_body<R>(reader: R) -> Body
where
    R: AsyncRead + Unpin + Send + 'static,
{
    Box::pin(ReaderStream::new(reader.compat()))
}
