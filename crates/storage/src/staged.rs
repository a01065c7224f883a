//! Write side of the cache: stage, then atomically commit.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use futures::io::{AsyncWrite, AsyncWriteExt};
use std::ffi::OsString;
use std::io::Result as IoResult;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::fs;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// A temporary file next to its final destination.
///
/// Nothing is visible at the destination until [`commit`](Self::commit)
/// renames the staged file over it. Dropping a `StagedFile` without
/// committing (an error, a disconnect, a cancelled task) removes the
/// temporary file.
pub struct StagedFile {
    file: Compat<fs::File>,
    temp: TempPath,
    dest: PathBuf,
}

impl StagedFile {
    /// Stage beside `dest` under a unique `.tmp-*` name, so concurrent
    /// stagings for the same destination never collide.
    pub async fn beside(dest: impl Into<PathBuf>) -> Result<Self> {
        let dest = dest.into();
        let parent = prepare_parent(&dest).await?;
        let named = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&parent)
            .map_err(|e| ErrorKind::from_io(e, &parent))?;
        let (file, temp) = named.into_parts();
        Ok(Self {
            file: fs::File::from_std(file).compat_write(),
            temp,
            dest,
        })
    }

    /// Stage at the fixed name `<dest>.tmp`, truncating any leftover from an
    /// earlier run. Callers must hold the destination exclusively.
    pub async fn at(dest: impl Into<PathBuf>) -> Result<Self> {
        let dest = dest.into();
        prepare_parent(&dest).await?;
        let mut name: OsString = dest.as_os_str().to_owned();
        name.push(".tmp");
        let path = PathBuf::from(name);
        let file = fs::File::create(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        let temp = TempPath::try_from_path(&path).map_err(|e| ErrorKind::from_io(e, &path))?;
        Ok(Self {
            file: file.compat_write(),
            temp,
            dest,
        })
    }

    /// Path of the temporary file.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Flush and atomically rename onto the destination.
    ///
    /// On failure the temporary file is removed and nothing appears at the
    /// destination.
    pub async fn commit(mut self) -> Result<PathBuf> {
        self.file.flush().await.map_err(|e| ErrorKind::from_io(e, &self.temp))?;
        let Self { file, temp, dest } = self;
        drop(file);
        temp.persist(&dest).map_err(|e| ErrorKind::from_io(e.error, &dest))?;
        tracing::debug!(path = %dest.display(), "committed cache entry");
        Ok(dest)
    }

    /// Abandon the staged file. Equivalent to dropping it.
    pub fn discard(self) {
        tracing::debug!(path = %self.temp.display(), "discarding staged file");
    }
}

async fn prepare_parent(dest: &Path) -> Result<PathBuf> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_raise(|| ErrorKind::InvalidPath(dest.to_path_buf()))?;
    fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, parent))?;
    Ok(parent.to_path_buf())
}

impl AsyncWrite for StagedFile {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<IoResult<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.file).poll_close(cx)
    }
}
