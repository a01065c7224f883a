//! Process-wide registry of destination paths with a fetch in progress.

use dashmap::DashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tracks which cache destinations currently have a writer.
///
/// Claiming is a single atomic insert, so exactly one of any number of
/// concurrent callers wins a given path. The registry is shared by `Arc`
/// between the live proxy path and the bulk workers.
#[derive(Debug, Default)]
pub struct DownloadCoordinator {
    in_flight: DashSet<PathBuf>,
}

impl DownloadCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `path`, or `None` if another fetch already holds it.
    ///
    /// The path is released when the returned [`Claim`] is dropped, whichever
    /// way the holder exits.
    pub fn try_claim(self: &Arc<Self>, path: impl Into<PathBuf>) -> Option<Claim> {
        let path = path.into();
        match self.in_flight.insert(path.clone()) {
            true => Some(Claim {
                coordinator: Arc::clone(self),
                path,
            }),
            false => None,
        }
    }

    /// Release `path`. Returns whether it was claimed.
    pub fn release(&self, path: &Path) -> bool {
        self.in_flight.remove(path).is_some()
    }

    /// Whether `path` is claimed right now. Never blocks, never mutates; the
    /// answer may be stale by the time the caller acts on it.
    pub fn peek(&self, path: &Path) -> bool {
        self.in_flight.contains(path)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Exclusive right to write one cache destination.
#[derive(Debug)]
pub struct Claim {
    coordinator: Arc<DownloadCoordinator>,
    path: PathBuf,
}

impl Claim {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.coordinator.release(&self.path);
    }
}
