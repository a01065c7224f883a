//! Binary Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("cannot create cache directory {}", _0.display())]
    CacheDir(#[error(not(source))] PathBuf),
    #[display("cannot read asset manifest {}", _0.display())]
    Manifest(#[error(not(source))] PathBuf),
    #[display("failed to download {_0}")]
    Download(#[error(not(source))] &'static str),
    #[display("server error")]
    Server,
}
