//! Compression Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A compression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Data is corrupt or malformed. Don't retry with the same input. Used for reading/decoding.
    #[display("invalid or corrupted data")]
    InvalidData,
    /// The requested encoding is not supported.
    #[display("unsupported encoding: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// An I/O operation failed. Used for writing/encoding.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Compression;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::InvalidData, "invalid or corrupted data", false)]
    #[case(ErrorKind::UnsupportedFormat("zstd".to_string()), "unsupported encoding: zstd", false)]
    #[case(ErrorKind::Io, "I/O error", true)]
    fn kinds(#[case] kind: ErrorKind, #[case] message: &str, #[case] retryable: bool) {
        assert_eq!(kind.to_string(), message);
        assert_eq!(kind.is_retryable(), retryable);
    }

    #[test]
    fn corrupt_input_is_not_retryable() {
        let err = Compression::Gzip.decompress(b"definitely not gzip").unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData);
        assert!(!err.is_retryable());
    }
}
