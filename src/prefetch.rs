//! Known asset catalogues, and warming the cache with them.

use crate::dist;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use skycache_fetch::{BulkDownloader, BulkReport, join_url};
use std::path::{Path, PathBuf};
use url::Url;

pub const MODELS_DIR: &str = "fetched/models/gta3.img";
pub const AUDIO_DIR: &str = "fetched/audio";
pub const SFX_DIR: &str = "fetched/audio/sfx.raw";

pub const RADIO_STATIONS: [&str; 7] = [
    "kchat.adf",
    "vcpr.adf",
    "fever.adf",
    "vrock.adf",
    "wave.adf",
    "emotion.adf",
    "espant.adf",
];
/// Sound effects are numbered `0.mp3` through this, inclusive.
pub const LAST_SFX: u32 = 9940;

pub fn sfx_files() -> impl Iterator<Item = String> {
    (0..=LAST_SFX).map(|n| format!("{n}.mp3"))
}

/// One asset name per line; surrounding whitespace, blank lines and `#`
/// comments are ignored.
pub fn parse_manifest(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Downloads the known catalogues from the origin into the cache root.
#[derive(Clone, Debug)]
pub struct Prefetcher {
    bulk: BulkDownloader,
    cdn: Url,
    root: PathBuf,
    manifest: Option<PathBuf>,
}

impl Prefetcher {
    pub fn new(bulk: BulkDownloader, cdn: Url, root: impl Into<PathBuf>, manifest: Option<PathBuf>) -> Self {
        Self {
            bulk,
            cdn,
            root: root.into(),
            manifest,
        }
    }

    /// Model archive entries listed in the manifest.
    pub async fn assets(&self) -> Result<BulkReport> {
        tracing::info!("=== Downloading game assets ===");
        let files = self.manifest_entries().await?;
        match (files.is_empty(), &self.manifest) {
            (false, _) => tracing::info!("Loaded {} files from the asset manifest", files.len()),
            (true, Some(path)) => {
                tracing::warn!(path = %path.display(), "asset manifest lists no files; no game assets will be downloaded");
            },
            (true, None) => {
                tracing::warn!("bundled asset manifest lists no files; pass --manifest to download game assets");
            },
        }
        self.category(files, MODELS_DIR, "assets").await
    }

    /// Radio stations, then sound effects. Stops at the first category with
    /// failures.
    pub async fn audio(&self) -> Result<()> {
        tracing::info!("=== Downloading audio files ===");
        tracing::info!("Downloading {} radio stations...", RADIO_STATIONS.len());
        self.category(RADIO_STATIONS, AUDIO_DIR, "radio").await?;
        tracing::info!("Downloading {} sfx files...", LAST_SFX + 1);
        self.category(sfx_files(), SFX_DIR, "sfx").await?;
        Ok(())
    }

    /// Everything, in the foreground. Any failure is returned.
    pub async fn download(&self) -> Result<()> {
        self.assets().await?;
        self.audio().await
    }

    /// Everything, on a detached task. Failures are logged and the next
    /// category still runs.
    pub fn spawn_background(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting background cache download...");
            if let Err(e) = self.assets().await {
                tracing::warn!(error = ?e, "background asset download incomplete");
            }
            if let Err(e) = self.audio().await {
                tracing::warn!(error = ?e, "background audio download incomplete");
            }
            tracing::info!("Background cache download complete");
        })
    }

    async fn category<I, S>(&self, files: I, dir: &str, label: &'static str) -> Result<BulkReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base = join_url(&self.cdn, dir, None).or_raise(|| ErrorKind::Download(label))?;
        self.bulk
            .run(files, &base, &self.root.join(dir), label)
            .await
            .or_raise(|| ErrorKind::Download(label))
    }

    async fn manifest_entries(&self) -> Result<Vec<String>> {
        let text = match &self.manifest {
            Some(path) => tokio::fs::read_to_string(path).await.or_raise(|| ErrorKind::Manifest(path.clone()))?,
            None => {
                let data = dist::get(dist::MANIFEST).ok_or_raise(|| ErrorKind::Manifest(Path::new(dist::MANIFEST).to_path_buf()))?;
                String::from_utf8_lossy(&data).into_owned()
            },
        };
        Ok(parse_manifest(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycache_fetch::{DownloadCoordinator, Origin};
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn prefetcher(root: &Path, manifest: Option<PathBuf>) -> Prefetcher {
        let origin = Origin::new("http://127.0.0.1:9/").unwrap();
        let cdn = origin.base().clone();
        Prefetcher::new(BulkDownloader::new(origin, DownloadCoordinator::new()), cdn, root, manifest)
    }

    #[test]
    fn manifest_lines() {
        let text = "  a.dff\n\n# comment\nb.txd  \r\n\t\n";
        assert_eq!(parse_manifest(text), vec!["a.dff", "b.txd"]);
    }

    #[test]
    fn sfx_catalogue() {
        let files: Vec<String> = sfx_files().collect();
        assert_eq!(files.len(), 9941);
        assert_eq!(files.first().map(String::as_str), Some("0.mp3"));
        assert_eq!(files.last().map(String::as_str), Some("9940.mp3"));
    }

    #[tokio::test]
    async fn missing_manifest_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = prefetcher(dir.path(), Some(dir.path().join("missing.txt")))
            .assets()
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Manifest(_)));
    }

    #[tokio::test]
    async fn empty_manifest_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("files.txt");
        std::fs::write(&manifest, "\n# nothing yet\n").unwrap();
        let report = prefetcher(dir.path(), Some(manifest)).assets().await.unwrap();
        assert_eq!(report, BulkReport::default());
    }

    #[tokio::test]
    async fn empty_bundled_manifest_is_reported() {
        let bundled = dist::get(dist::MANIFEST).unwrap();
        assert!(parse_manifest(&String::from_utf8_lossy(&bundled)).is_empty());

        let logs = Captured::default();
        let subscriber = tracing_subscriber::fmt().with_writer(logs.clone()).with_ansi(false).finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        let dir = tempfile::tempdir().unwrap();
        let report = prefetcher(dir.path(), None).assets().await.unwrap();
        assert_eq!(report, BulkReport::default());
        assert!(logs.text().contains("bundled asset manifest lists no files"), "{}", logs.text());
    }
}
