//! HTTP access to the origin CDN.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::TryStreamExt;
use futures::io::AsyncRead;
use reqwest::{Client, Response};
use std::io::Error as IoError;
use std::time::Duration;
use url::Url;

/// Largest origin body that will be relayed or cached.
pub const MAX_RESPONSE_SIZE: u64 = 500 * 1024 * 1024;
/// Deadline for a whole upstream exchange, connect through last body byte.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// The origin server, and the client used to talk to it.
///
/// The client never decompresses transparently: bodies arrive exactly as the
/// origin encoded them, and callers decide whether to decode.
#[derive(Clone, Debug)]
pub struct Origin {
    client: Client,
    base: Url,
    limit: u64,
    timeout: Duration,
}

impl Origin {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).or_raise(|| ErrorKind::InvalidRequest(format!("invalid origin URL: {base}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::InvalidRequest(format!("unsupported origin scheme: {}", base.scheme())));
        }
        let client = Client::builder()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .no_zstd()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::UpstreamUnavailable("failed to build HTTP client".to_string()))?;
        Ok(Self {
            client,
            base,
            limit: MAX_RESPONSE_SIZE,
            timeout: UPSTREAM_TIMEOUT,
        })
    }

    /// Override the body size limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// URL of `path` (and optional raw query) underneath the origin base.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> Result<Url> {
        join_url(&self.base, path, query)
    }

    /// Start a request with this origin's deadline applied.
    pub fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client.request(method, url).timeout(self.timeout)
    }
}

/// Append `path` to `base` segment by segment (so each is percent-encoded
/// exactly once), and set the raw `query` if given.
///
/// ```
/// use url::Url;
/// use skycache_fetch::join_url;
///
/// let base = Url::parse("https://cdn.example/vcsky/").unwrap();
/// let url = join_url(&base, "fetched/audio/my song.mp3", Some("v=2")).unwrap();
/// assert_eq!(url.as_str(), "https://cdn.example/vcsky/fetched/audio/my%20song.mp3?v=2");
/// ```
pub fn join_url(base: &Url, path: &str, query: Option<&str>) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ErrorKind::InvalidRequest(format!("origin URL cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    url.set_query(query.filter(|q| !q.is_empty()));
    Ok(url)
}

/// An origin response body as a runtime-agnostic reader. Network errors come
/// out as [`std::io::Error`]s wrapping the [`reqwest::Error`].
pub(crate) fn body_reader(response: Response) -> impl AsyncRead + Unpin + Send + 'static {
    Box::pin(response.bytes_stream()).map_err(IoError::other).into_async_read()
}
