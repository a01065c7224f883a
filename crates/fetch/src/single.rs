//! Fetch one asset from the origin into the cache, decoded.

use crate::coordinator::DownloadCoordinator;
use crate::error::{ErrorKind, Result, raise_classified};
use crate::origin::{Origin, body_reader};
use exn::ResultExt;
use futures::io::copy as async_copy;
use reqwest::Method;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, HeaderValue};
use skycache_asyncutils::CappedReader;
use skycache_compress::Compression;
use skycache_storage::StagedFile;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::instrument;
use url::Url;

/// What [`fetch_to_cache`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// Downloaded and committed this many (decoded) bytes.
    Downloaded(u64),
    /// The destination already existed; nothing was requested.
    AlreadyCached,
    /// Another fetch holds the destination; it will produce the file.
    InFlight,
}

/// Download `url` into `dest`, decoding whatever `Content-Encoding` the
/// origin chose, and commit it atomically.
///
/// Idempotent: an existing `dest` or a concurrent fetch for the same `dest`
/// is a success without any network traffic. The bytes are staged at
/// `<dest>.tmp` and only renamed onto `dest` once complete; on any failure
/// the staged file is removed. The claim on `dest` is released on every exit.
#[instrument(level = "debug", skip(origin, coordinator), fields(url = %url, dest = %dest.display()))]
pub async fn fetch_to_cache(
    origin: &Origin,
    coordinator: &Arc<DownloadCoordinator>,
    url: Url,
    dest: &Path,
) -> Result<Fetched> {
    if exists(dest).await {
        return Ok(Fetched::AlreadyCached);
    }
    let Some(_claim) = coordinator.try_claim(dest) else {
        tracing::debug!("fetch already in flight");
        return Ok(Fetched::InFlight);
    };
    // Another fetch may have committed between the first check and the claim.
    if exists(dest).await {
        return Ok(Fetched::AlreadyCached);
    }

    let response = origin
        .request(Method::GET, url)
        .header(ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"))
        .send()
        .await
        .map_err(|e| raise_classified(e, |e| ErrorKind::from(e)))?;
    let status = response.status();
    if !status.is_success() {
        exn::bail!(ErrorKind::UpstreamBadStatus(status.as_u16()));
    }
    if let Some(length) = response.content_length()
        && length > origin.limit()
    {
        exn::bail!(ErrorKind::UpstreamTooLarge(origin.limit()));
    }
    let encoding = response
        .headers()
        .get(CONTENT_ENCODING)
        .map(|v| v.to_str().unwrap_or("<non-ascii>").to_string());
    let compression = Compression::from_content_encoding(encoding.as_deref())
        .or_raise(|| ErrorKind::UnsupportedEncoding(encoding.clone().unwrap_or_default()))?;

    let mut decoder = compression.async_wrap_reader(CappedReader::new(body_reader(response), origin.limit()));
    let mut staged = StagedFile::at(dest).await.or_raise(|| ErrorKind::CacheWriteFailed(dest.to_path_buf()))?;
    let bytes = async_copy(&mut decoder, &mut staged)
        .await
        .map_err(|e| raise_classified(e, |e| ErrorKind::from_transfer(e, dest)))?;
    staged.commit().await.or_raise(|| ErrorKind::CacheWriteFailed(dest.to_path_buf()))?;
    tracing::debug!(bytes, %compression, "cached");
    Ok(Fetched::Downloaded(bytes))
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}
