//! The application shell, embedded into the binary at compile time using
//! [`rust-embed`](rust_embed).

use rust_embed::Embed;
use std::borrow::Cow;

#[derive(Embed)]
#[folder = "dist/"]
struct Dist;

pub const INDEX: &str = "index.html";
pub const MANIFEST: &str = "streaming_files.txt";

/// A bundled file's contents, by path relative to the bundle root.
pub fn get(path: &str) -> Option<Cow<'static, [u8]>> {
    Dist::get(path).map(|file| file.data)
}

/// Content type for a bundled file, by extension.
pub fn content_type(path: &str) -> String {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("html") => "text/html; charset=utf-8".to_string(),
        _ => mime_guess::from_path(path).first_or_octet_stream().to_string(),
    }
}
