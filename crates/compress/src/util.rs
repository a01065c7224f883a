use crate::Compression;
use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Compression {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl Compression {
    /// Returns the file extension for this compression format.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Brotli => ".br",
            Compression::Gzip => ".gz",
        }
    }

    /// Returns the short name for configuration (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Brotli => "brotli",
            Compression::Gzip => "gzip",
        }
    }

    /// The `Content-Encoding` token for this format, `None` for identity.
    #[inline]
    #[must_use]
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Brotli => Some("br"),
            Compression::Gzip => Some("gzip"),
        }
    }

    /// Append this format's extension to `path` (`a/b.wasm` → `a/b.wasm.br`).
    #[must_use]
    pub fn append_extension(&self, path: impl AsRef<Path>) -> PathBuf {
        let mut name: OsString = path.as_ref().as_os_str().to_owned();
        name.push(self.extension());
        PathBuf::from(name)
    }

    /// Split a path into its logical base and the encoding its suffix names.
    ///
    /// Only one trailing suffix is stripped: `a.wasm.br` → (`a.wasm`, Brotli),
    /// `a.br.br` → (`a.br`, Brotli).
    #[must_use]
    pub fn split_path(path: impl AsRef<Path>) -> (PathBuf, Compression) {
        let path = path.as_ref();
        match Compression::from_path(path) {
            Compression::None => (path.to_path_buf(), Compression::None),
            encoding => (path.with_extension(""), encoding),
        }
    }
}
