//! Cache-miss path: relay the origin's answer while filling the cache.

use crate::coordinator::{Claim, DownloadCoordinator};
use crate::error::{ErrorKind, Result, raise_classified};
use crate::origin::{Origin, body_reader};
use crate::response::{AssetRequest, AssetResponse, Body, reader_body};
use async_stream::stream;
use bytes::Bytes;
use exn::ResultExt;
use futures::TryStreamExt;
use futures::io::{AsyncRead, AsyncReadExt};
use reqwest::header::{
    ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_SECURITY_POLICY, HOST,
    HeaderName, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
};
use reqwest::{Method, StatusCode};
use skycache_asyncutils::{CappedReader, TeeReader};
use skycache_compress::{Accepted, Compression};
use skycache_storage::{AssetPath, AssetStore, StagedFile};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;

/// Serves an asset from the cache, or from the origin while caching it.
///
/// On a miss the origin body is read exactly once: every chunk goes to the
/// client and, verbatim, into a staged file beside the cache destination.
/// The staged file is committed only after the whole body has arrived.
#[derive(Clone, Debug)]
pub struct ProxyCacheFetcher {
    store: AssetStore,
    coordinator: Arc<DownloadCoordinator>,
    origin: Origin,
}

impl ProxyCacheFetcher {
    pub fn new(store: AssetStore, coordinator: Arc<DownloadCoordinator>, origin: Origin) -> Self {
        Self {
            store,
            coordinator,
            origin,
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<DownloadCoordinator> {
        &self.coordinator
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Answer `request` for `asset`, fetching `origin_url` on a cache miss.
    ///
    /// Only a `200` answer to a `GET`, for a path nobody else is fetching,
    /// whose `Content-Encoding` agrees with the path's own suffix, is cached.
    /// Everything else is relayed untouched. Failing to set up the cache
    /// file degrades to relaying; it never fails the request.
    #[instrument(level = "debug", skip(self, request), fields(asset = %asset, url = %origin_url))]
    pub async fn serve(&self, request: &AssetRequest, asset: &AssetPath, origin_url: Url) -> Result<AssetResponse> {
        let accepted = request.accepted();
        // A background fetch may have committed since the caller last looked.
        if let Some(response) = self.serve_local(asset, accepted).await? {
            return Ok(response);
        }

        let local_path = self.store.local_path(asset);
        let in_flight = self.coordinator.peek(&local_path);

        let mut upstream = self.origin.request(request.method.clone(), origin_url);
        for (name, value) in &request.headers {
            if !skip_request_header(name) {
                upstream = upstream.header(name, value);
            }
        }
        let response = upstream
            .send()
            .await
            .map_err(|e| raise_classified(e, |e| ErrorKind::UpstreamUnavailable(e.to_string())))?;

        let limit = self.origin.limit();
        if let Some(length) = response.content_length()
            && length > limit
        {
            tracing::warn!(length, limit, "upstream response too large");
            exn::bail!(ErrorKind::UpstreamTooLarge(limit));
        }

        let status = response.status();
        let upstream_encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .map(|v| Compression::from_content_encoding(v.to_str().ok()).ok());
        let mut headers = response.headers().clone();
        for name in [TRANSFER_ENCODING, CONNECTION, CONTENT_SECURITY_POLICY] {
            headers.remove(name);
        }

        let path_encoding = Compression::from_path(&local_path);
        // Error bodies are not brotli no matter what the path says.
        let decompress = path_encoding == Compression::Brotli
            && !accepted.brotli
            && status.is_success()
            && request.method == Method::GET;
        if decompress {
            headers.remove(CONTENT_ENCODING);
            headers.remove(CONTENT_LENGTH);
        }
        let client_encoding = match decompress {
            true => Compression::Brotli,
            false => Compression::None,
        };

        let uncacheable = if status != StatusCode::OK {
            Some("non-200 status")
        } else if request.method != Method::GET {
            Some("not a GET")
        } else if in_flight {
            Some("fetch already in flight")
        } else if !encoding_matches(upstream_encoding, path_encoding) {
            Some("upstream encoding does not match path")
        } else {
            None
        };
        let body = CappedReader::new(body_reader(response), limit);
        if let Some(reason) = uncacheable {
            tracing::debug!(%status, reason, "relaying without caching");
            return Ok(AssetResponse {
                status,
                headers,
                body: relay(body, client_encoding),
            });
        }

        let Some(claim) = self.coordinator.try_claim(&local_path) else {
            tracing::debug!("lost the claim race; relaying without caching");
            return Ok(AssetResponse {
                status,
                headers,
                body: relay(body, client_encoding),
            });
        };
        let staged = match StagedFile::beside(&local_path).await {
            Ok(staged) => staged,
            Err(e) => {
                tracing::warn!(path = %local_path.display(), error = ?e, "cannot stage cache file; relaying without caching");
                return Ok(AssetResponse {
                    status,
                    headers,
                    body: relay(body, client_encoding),
                });
            },
        };
        Ok(AssetResponse {
            status,
            headers,
            body: tee_to_cache(body, staged, claim, client_encoding, local_path),
        })
    }

    /// The cached answer for `asset`, if there is one.
    pub async fn serve_local(&self, asset: &AssetPath, accepted: Accepted) -> Result<Option<AssetResponse>> {
        let resolved = match self.store.resolve(asset, accepted).await {
            Ok(resolved) => resolved,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.raise(ErrorKind::LocalIo)),
        };
        let reader = self.store.open(&resolved).await.or_raise(|| ErrorKind::LocalIo)?;
        tracing::debug!(path = %resolved.path.display(), decompress = resolved.decompress, "serving from cache");
        Ok(Some(AssetResponse::cached(&resolved, reader)))
    }
}

/// Request headers that must not be forwarded: `Host` and `Accept-Encoding`
/// (the origin's own encoding choice is what gets cached), plus hop-by-hop
/// headers and a body length for a body that is never forwarded.
fn skip_request_header(name: &HeaderName) -> bool {
    [HOST, ACCEPT_ENCODING, CONNECTION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE, CONTENT_LENGTH].contains(name)
        || name.as_str() == "keep-alive"
        || name.as_str() == "proxy-connection"
}

/// The origin's bytes are cacheable under a path only if they are what that
/// path names: identity-encoded, or encoded exactly as its suffix says.
fn encoding_matches(upstream: Option<Option<Compression>>, path: Compression) -> bool {
    match upstream {
        None | Some(Some(Compression::None)) => true,
        Some(Some(encoding)) => encoding == path,
        Some(None) => false,
    }
}

/// Relay an origin body to the client, decoding it first if required.
fn relay<R>(body: R, encoding: Compression) -> Body
where
    R: AsyncRead + Unpin + Send + 'static,
{
    Box::pin(
        reader_body(encoding.async_wrap_reader(body))
            .inspect_err(|e| tracing::warn!(error = %e, "upstream relay interrupted")),
    )
}

/// Relay an origin body to the client while writing it verbatim into
/// `staged`, committing onto its destination once the body is complete.
///
/// The claim and the staged file live inside the stream: if the client goes
/// away the stream is dropped, which deletes the staged file and releases
/// the claim.
fn tee_to_cache<R>(body: R, staged: StagedFile, claim: Claim, encoding: Compression, dest: PathBuf) -> Body
where
    R: AsyncRead + Unpin + Send + 'static,
{
    Box::pin(stream! {
        let _claim = claim;
        let mut tee = TeeReader::new(body, staged);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let outcome = {
            let mut reader = encoding.async_wrap_reader(&mut tee);
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break Ok(()),
                    Ok(n) => yield Ok(Bytes::copy_from_slice(&buf[..n])),
                    Err(e) => break Err(e),
                }
            }
        };
        // A decoder may stop at the end of its frame; the cache still wants
        // every byte the origin sent.
        let outcome = match outcome {
            Ok(()) => tee.finish().await.map(|_| ()),
            Err(e) => Err(e),
        };
        let bytes = tee.bytes_read();
        let (_, staged) = tee.into_inner();
        match outcome {
            Ok(()) => match staged.commit().await {
                Ok(_) => tracing::info!(path = %dest.display(), bytes, "cached upstream response"),
                Err(e) => tracing::warn!(path = %dest.display(), error = ?e, "failed to commit cache file"),
            },
            Err(e) => {
                tracing::warn!(path = %dest.display(), bytes, error = %e, "proxy transfer failed; discarding cache file");
                staged.discard();
                yield Err(e);
            },
        }
    })
}
