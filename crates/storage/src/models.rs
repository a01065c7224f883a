//! Storage models.

use skycache_compress::Compression;
use std::path::{Path, PathBuf};

/// Which cached file will answer a request, and how to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Absolute path of the file on disk
    pub path: PathBuf,
    /// Encoding of the bytes as stored on disk
    pub encoding: Compression,
    /// Content type of the logical (decoded) asset
    pub content_type: String,
    /// The client can't take the stored encoding; decode while sending
    pub decompress: bool,
    /// Size on disk
    pub size: u64,
}
impl Resolved {
    /// The `Content-Encoding` to send, if any.
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self.decompress {
            true => None,
            false => self.encoding.content_encoding(),
        }
    }

    /// The `Content-Length` to send; unknown when decoding on the fly.
    pub fn content_length(&self) -> Option<u64> {
        (!self.decompress).then_some(self.size)
    }
}

/// Content type for an asset, judged by the extension of its logical name
/// (any `.br`/`.gz` suffix removed first).
///
/// `.wasm` is always `application/wasm`; browsers refuse to stream-compile
/// WebAssembly served as anything else.
pub fn content_type(path: impl AsRef<Path>) -> String {
    let (base, _) = Compression::split_path(path);
    match base.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("wasm") => "application/wasm".to_string(),
        _ => mime_guess::from_path(&base).first_or_octet_stream().to_string(),
    }
}
