//! Warm the cache from a list of asset names with a fixed pool of workers.

use crate::coordinator::DownloadCoordinator;
use crate::error::{ErrorKind, Result};
use crate::origin::{Origin, join_url};
use crate::single::{Fetched, fetch_to_cache};
use skycache_storage::AssetPath;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use url::Url;

pub const DEFAULT_WORKERS: usize = 8;

/// Outcome counts of one bulk run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub total: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    downloaded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn done(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed) + self.skipped.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed)
    }

    fn report(&self, total: u64) -> BulkReport {
        BulkReport {
            total,
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Downloads many assets into a directory, `workers` at a time.
///
/// Each item goes through [`fetch_to_cache`], so bulk runs and live proxy
/// traffic never fetch the same file twice at once.
#[derive(Clone, Debug)]
pub struct BulkDownloader {
    origin: Origin,
    coordinator: Arc<DownloadCoordinator>,
    workers: usize,
}

impl BulkDownloader {
    pub fn new(origin: Origin, coordinator: Arc<DownloadCoordinator>) -> Self {
        Self {
            origin,
            coordinator,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Set the worker count; zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every name in `items` from under `base_url` into `output_dir`.
    ///
    /// Files already present are skipped. Individual failures are logged and
    /// counted; the run carries on, and the error returned at the end names
    /// how many of the `label` files failed.
    pub async fn run<I, S>(&self, items: I, base_url: &Url, output_dir: &Path, label: &str) -> Result<BulkReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        let total = items.len() as u64;
        let counters = Arc::new(Counters::default());
        let (tx, rx) = mpsc::channel::<String>(self.workers);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.workers.min(items.len()) {
            let rx = Arc::clone(&rx);
            let job = Job {
                origin: self.origin.clone(),
                coordinator: Arc::clone(&self.coordinator),
                base_url: base_url.clone(),
                output_dir: output_dir.to_path_buf(),
                label: label.to_string(),
                total,
                counters: Arc::clone(&counters),
            };
            workers.spawn(async move {
                loop {
                    // Hold the lock only while waiting for the next name.
                    let next = rx.lock().await.recv().await;
                    let Some(name) = next else { break };
                    job.process(&name).await;
                }
            });
        }

        for name in items {
            if tx.send(name).await.is_err() {
                break;
            }
        }
        drop(tx);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(label, error = %e, "bulk download worker panicked");
            }
        }

        let report = counters.report(total);
        tracing::info!(
            "[{label}] Done: {} total (downloaded: {}, skipped: {}, failed: {})",
            report.total,
            report.downloaded,
            report.skipped,
            report.failed
        );
        // Items lost to a panicked worker are neither skipped nor downloaded.
        let failed = report.total - report.downloaded - report.skipped;
        if failed > 0 {
            exn::bail!(ErrorKind::BulkIncomplete {
                failed,
                total,
                label: label.to_string(),
            });
        }
        Ok(report)
    }
}

struct Job {
    origin: Origin,
    coordinator: Arc<DownloadCoordinator>,
    base_url: Url,
    output_dir: PathBuf,
    label: String,
    total: u64,
    counters: Arc<Counters>,
}

impl Job {
    async fn process(&self, name: &str) {
        let asset = match AssetPath::parse(name) {
            Ok(asset) => asset,
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.log_failure(name, &e);
                return;
            },
        };
        let dest = self.output_dir.join(asset.as_path());
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let outcome = match join_url(&self.base_url, name, None) {
            Ok(url) => fetch_to_cache(&self.origin, &self.coordinator, url, &dest).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(Fetched::Downloaded(_)) => {
                self.counters.downloaded.fetch_add(1, Ordering::Relaxed);
                tracing::info!("[{}] {}/{} OK: {name}", self.label, self.counters.done(), self.total);
            },
            Ok(Fetched::AlreadyCached | Fetched::InFlight) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.log_failure(name, &*e);
            },
        }
    }

    fn log_failure(&self, name: &str, err: &dyn std::fmt::Display) {
        tracing::warn!("[{}] {}/{} FAIL: {name} ({err})", self.label, self.counters.done(), self.total);
    }
}
