//! Content encodings for cached assets.
//!
//! Cached assets live on disk either raw or pre-compressed with a `.br`/`.gz`
//! suffix. This crate wraps the codecs behind a single [`Compression`] enum,
//! providing:
//!
//! - **Detection** from file suffixes ([`Compression::from_path`]) and from
//!   HTTP `Content-Encoding` values ([`Compression::from_content_encoding`])
//! - **Negotiation** against a client's `Accept-Encoding` header ([`Accepted`])
//! - **In-memory** compression/decompression (`Compression::compress`,
//!   `Compression::decompress`; requires the `encode` feature, meant for
//!   building fixtures)
//! - **Streaming** decoders over [`futures::io`](::futures::io) readers
//!   (requires the `async` feature; not Tokio-specific)

mod accept;
mod construct;
pub mod error;
#[cfg(feature = "async")]
mod futures;
#[cfg(any(test, feature = "encode"))]
mod ops;
mod util;

pub use crate::accept::Accepted;

/// A supported content encoding. Defaults to [`None`](Self::None) (identity).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Brotli compression (.br)
    Brotli,
    /// Gzip compression (.gz)
    Gzip,
}
