use crate::Compression;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "identity" => Ok(Compression::None),
            "br" | "brotli" => Ok(Compression::Brotli),
            "gz" | "gzip" | "x-gzip" => Ok(Compression::Gzip),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Compression {
    /// Detect compression from a file extension.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext.to_lowercase().as_str() {
                "br" => Compression::Brotli,
                "gz" => Compression::Gzip,
                _ => Compression::None,
            })
            .unwrap_or(Compression::None)
    }

    /// Detect compression from an HTTP `Content-Encoding` header value.
    ///
    /// A missing or empty header means identity. Anything this crate cannot
    /// decode (`deflate`, `zstd`, stacked encodings) is an
    /// [`UnsupportedFormat`](ErrorKind::UnsupportedFormat) error rather than
    /// being silently treated as raw bytes.
    pub fn from_content_encoding(value: Option<&str>) -> Result<Self, Error> {
        match value.map(str::trim) {
            None | Some("") => Ok(Compression::None),
            Some(v) if v.contains(',') => exn::bail!(ErrorKind::UnsupportedFormat(v.to_string())),
            Some(v) => v.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;

    #[rstest]
    #[case("none", Compression::None)]
    #[case("identity", Compression::None)]
    #[case("br", Compression::Brotli)]
    #[case("brotli", Compression::Brotli)]
    #[case("BR", Compression::Brotli)]
    #[case("gz", Compression::Gzip)]
    #[case("gzip", Compression::Gzip)]
    #[case("x-gzip", Compression::Gzip)]
    fn test_from_str(#[case] test: &str, #[case] expected: Compression) {
        assert_eq!(test.parse::<Compression>().unwrap(), expected);
    }

    #[rstest]
    #[case("invalid")]
    #[case("zstd")]
    #[case("deflate")]
    #[case(" ")]
    fn test_from_str_invalid(#[case] test: &str) {
        assert!(test.parse::<Compression>().is_err());
    }

    #[rstest]
    #[case("file.wasm", Compression::None)]
    #[case("file.txt", Compression::None)]
    // `.br` is a dotfile with no extension (like `.bashrc`), and therefore
    // with no extension is considered to have no compression.
    #[case(".br", Compression::None)]
    #[case("models/gta3.img/file.dff.br", Compression::Brotli)]
    #[case("file.wasm.gz", Compression::Gzip)]
    #[case("FILE.WASM.GZ", Compression::Gzip)]
    #[case("archive.tar.bz2", Compression::None)]
    fn test_from_path(#[case] test: &str, #[case] expected: Compression) {
        assert_eq!(Compression::from_path(test), expected);
    }

    #[rstest]
    #[case(None, Compression::None)]
    #[case(Some(""), Compression::None)]
    #[case(Some("br"), Compression::Brotli)]
    #[case(Some(" gzip "), Compression::Gzip)]
    fn test_from_content_encoding(#[case] value: Option<&str>, #[case] expected: Compression) {
        assert_eq!(Compression::from_content_encoding(value).unwrap(), expected);
    }

    #[rstest]
    #[case("deflate")]
    #[case("gzip, br")]
    #[case("zstd")]
    fn test_from_content_encoding_unsupported(#[case] value: &str) {
        assert!(Compression::from_content_encoding(Some(value)).is_err());
    }
}
