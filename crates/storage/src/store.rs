//! Read side of the cache: which variant answers a request.

use crate::error::{ErrorKind, Result};
use crate::models::{Resolved, content_type};
use crate::path::AssetPath;
use futures::io::AsyncRead;
use skycache_compress::{Accepted, Compression};
use std::fs::create_dir_all as sync_create_dir;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::compat::TokioAsyncReadCompatExt;

/// Body of a cached asset, decoded if the client needed it to be.
pub type AssetReader = Box<dyn AsyncRead + Unpin + Send>;

/// The on-disk cache, rooted at a single directory.
///
/// # Examples
///
/// ```no_run
/// use skycache_compress::Accepted;
/// use skycache_storage::{AssetPath, AssetStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = AssetStore::new("/var/cache/skycache")?;
/// let asset: AssetPath = "fetched/audio/wave.adf".parse()?;
/// let resolved = store.resolve(&asset, Accepted::parse("gzip, br")).await?;
/// println!("{} ({:?})", resolved.path.display(), resolved.content_encoding());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}
impl AssetStore {
    /// Open (creating if necessary) a cache rooted at `root`.
    ///
    /// Relative roots are made absolute against the current directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::path::absolute(root.as_ref()).map_err(|e| ErrorKind::from_io(e, root.as_ref()))?;
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at startup; not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
            tracing::info!(root = %root.display(), "created cache directory");
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `asset` is (or will be) cached, exactly as named.
    pub fn local_path(&self, asset: &AssetPath) -> PathBuf {
        self.root.join(asset.as_path())
    }

    /// Whether `asset` is cached exactly as named (no variant lookup).
    pub async fn contains(&self, asset: &AssetPath) -> Result<bool> {
        Ok(stat_file(&self.local_path(asset)).await?.is_some())
    }

    /// Pick the cached file that best answers a request for `asset`.
    ///
    /// In order of preference:
    /// 1. `<base>.br`, if the client accepts brotli
    /// 2. `<base>.gz`, if the client accepts gzip
    /// 3. the requested path itself
    /// 4. `<base>.br` decoded on the fly, if the client does not accept brotli
    ///
    /// where `<base>` is the requested path minus one `.br`/`.gz` suffix. There
    /// is no decode-on-the-fly fallback for gzip.
    #[tracing::instrument(level = "debug", skip(self), fields(asset = %asset))]
    pub async fn resolve(&self, asset: &AssetPath, accepted: Accepted) -> Result<Resolved> {
        let requested = self.local_path(asset);
        let (base, requested_encoding) = Compression::split_path(&requested);
        let brotli = Compression::Brotli.append_extension(&base);
        let gzip = Compression::Gzip.append_extension(&base);

        let mut candidates = Vec::with_capacity(3);
        if accepted.brotli {
            candidates.push((brotli.clone(), Compression::Brotli));
        }
        if accepted.gzip {
            candidates.push((gzip, Compression::Gzip));
        }
        candidates.push((requested, requested_encoding));
        if !accepted.brotli {
            candidates.push((brotli, Compression::Brotli));
        }

        for (path, encoding) in candidates {
            let Some(size) = stat_file(&path).await? else {
                continue;
            };
            let decompress = encoding == Compression::Brotli && !accepted.brotli;
            tracing::debug!(path = %path.display(), %encoding, decompress, "cache hit");
            return Ok(Resolved {
                path,
                encoding,
                content_type: content_type(&base),
                decompress,
                size,
            });
        }
        exn::bail!(ErrorKind::NotFound(asset.as_path().to_path_buf()))
    }

    /// Open a resolved file for sending, wrapping it in a decoder if needed.
    pub async fn open(&self, resolved: &Resolved) -> Result<AssetReader> {
        let file = fs::File::open(&resolved.path).await.map_err(|e| ErrorKind::from_io(e, &resolved.path))?;
        let reader = file.compat();
        Ok(match resolved.decompress {
            true => resolved.encoding.async_wrap_reader(reader),
            false => Box::new(reader),
        })
    }
}

/// Size of `path` if it is a regular file. Missing files, directories and
/// paths running through a non-directory all count as absent.
async fn stat_file(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
        Ok(_) => Ok(None),
        Err(e) if matches!(e.kind(), IoErrorKind::NotFound | IoErrorKind::NotADirectory) => Ok(None),
        Err(e) => exn::bail!(ErrorKind::from_io(e, path)),
    }
}
