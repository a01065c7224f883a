//! Fetch Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Errors from the storage crate are raised into these
//! kinds with `or_raise`, so the full tree survives for logging.

use derive_more::{Display, Error};
use skycache_asyncutils::LimitExceeded;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request can never be satisfied (bad path, bad origin URL).
    #[display("invalid request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
    /// Nothing cached and nothing to fetch.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Origin could not be reached, or gave up before sending headers.
    #[display("upstream unavailable: {_0}")]
    UpstreamUnavailable(#[error(not(source))] String),
    /// Origin body is larger than the configured limit.
    #[display("upstream response exceeds {_0} bytes")]
    UpstreamTooLarge(#[error(not(source))] u64),
    /// Origin answered with a non-success status.
    #[display("status {_0}")]
    UpstreamBadStatus(#[error(not(source))] u16),
    /// Origin used a `Content-Encoding` that can't be decoded.
    #[display("unsupported upstream encoding: {_0}")]
    UnsupportedEncoding(#[error(not(source))] String),
    /// Body stopped early or arrived corrupt.
    #[display("transfer interrupted")]
    PartialTransfer,
    /// The cache file could not be staged, written or committed.
    #[display("failed to write cache entry: {}", _0.display())]
    CacheWriteFailed(#[error(not(source))] PathBuf),
    /// Reading the local cache failed for a reason other than absence.
    #[display("local I/O error")]
    LocalIo,
    /// Some items of a bulk run failed.
    #[display("{failed} of {total} {label} files failed to download")]
    BulkIncomplete { failed: u64, total: u64, label: String },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable(_) | Self::PartialTransfer | Self::LocalIo | Self::BulkIncomplete { .. } => true,
            Self::UpstreamBadStatus(status) => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Classify an I/O error from a streaming copy between an origin body
    /// and a cache file.
    pub(crate) fn from_transfer(err: &IoError, dest: &Path) -> Self {
        if let Some(limit) = LimitExceeded::find(err) {
            return Self::UpstreamTooLarge(limit.limit);
        }
        let from_network = err.get_ref().is_some_and(|inner| inner.is::<reqwest::Error>());
        match from_network || matches!(err.kind(), IoErrorKind::InvalidData | IoErrorKind::UnexpectedEof) {
            true => Self::PartialTransfer,
            false => Self::CacheWriteFailed(dest.to_path_buf()),
        }
    }
}

/// Raise `err` as the child of whichever kind `classify` picks for it.
#[track_caller]
pub(crate) fn raise_classified<E, F>(err: E, classify: F) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
    F: FnOnce(&E) -> ErrorKind,
{
    let kind = classify(&err);
    exn::Exn::new(err).raise(kind)
}

impl From<&reqwest::Error> for ErrorKind {
    fn from(err: &reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::UpstreamBadStatus(status.as_u16()),
            None => Self::UpstreamUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::UpstreamBadStatus(404), "status 404")]
    #[case(ErrorKind::UpstreamTooLarge(10), "upstream response exceeds 10 bytes")]
    #[case(
        ErrorKind::BulkIncomplete { failed: 3, total: 7, label: "radio".to_string() },
        "3 of 7 radio files failed to download"
    )]
    fn error_kind_display(#[case] kind: ErrorKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }

    #[rstest]
    #[case(ErrorKind::UpstreamBadStatus(503), true)]
    #[case(ErrorKind::UpstreamBadStatus(404), false)]
    #[case(ErrorKind::UpstreamTooLarge(1), false)]
    #[case(ErrorKind::PartialTransfer, true)]
    #[case(ErrorKind::InvalidRequest("..".to_string()), false)]
    fn error_kind_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn transfer_errors_are_classified() {
        let dest = Path::new("/cache/a.wasm");
        let limit = IoError::other(LimitExceeded { limit: 5 });
        assert!(matches!(ErrorKind::from_transfer(&limit, dest), ErrorKind::UpstreamTooLarge(5)));
        let corrupt = IoError::new(IoErrorKind::InvalidData, "bad brotli");
        assert!(matches!(ErrorKind::from_transfer(&corrupt, dest), ErrorKind::PartialTransfer));
        let disk = IoError::new(IoErrorKind::StorageFull, "no space");
        assert!(matches!(ErrorKind::from_transfer(&disk, dest), ErrorKind::CacheWriteFailed(_)));
    }
}
