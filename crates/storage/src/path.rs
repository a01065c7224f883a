//! Path validation.
//!
//! Asset paths come straight from request URLs and manifest files, so they are
//! validated before they are ever joined onto the cache root.

use crate::error::{Error, ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Validates a relative asset path and returns it normalized.
///
/// Any `..` segment is rejected outright, even one that would stay inside the
/// cache root once resolved. Leading slashes, `.` segments and repeated
/// separators are dropped.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use skycache_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("fetched/models/gta3.img/bus.dff").is_ok());
/// assert!(validate_path("/fetched/audio/wave.adf").is_ok());
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// // Paths get normalized
/// assert_eq!(
///     validate_path("/fetched/./audio//sfx.raw/").unwrap(),
///     Path::new("fetched/audio/sfx.raw")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidPath(path.as_ref().to_path_buf());
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) | Component::ParentDir => exn::bail!(invalid()),
        }
    }
    match components.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(components.into_iter().collect()),
    }
}

/// A validated, normalized path relative to the cache root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetPath(PathBuf);

impl AssetPath {
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        validate(path).map(Self)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for AssetPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for AssetPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0.display())
    }
}

impl FromStr for AssetPath {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}
