mod common;

use std::time::Duration;

use common::{FakeOrigin, Reply, files, payload};
use rstest::rstest;
use skycache_compress::Compression;
use skycache_fetch::error::ErrorKind;
use skycache_fetch::{BulkDownloader, BulkReport, DownloadCoordinator, Fetched, fetch_to_cache};
use url::Url;

fn url(origin: &FakeOrigin, path: &str) -> Url {
    Url::parse(&origin.base).unwrap().join(path).unwrap()
}

#[rstest]
#[case::identity(Reply::Ok(b"radio static".to_vec()))]
#[case::gzip(Reply::Encoded("gzip", Compression::Gzip.compress(b"radio static").unwrap()))]
#[case::brotli(Reply::Encoded("br", Compression::Brotli.compress(b"radio static").unwrap()))]
#[case::chunked(Reply::Chunked(b"radio static".to_vec()))]
#[tokio::test]
async fn fetch_decodes_and_commits(#[case] reply: Reply) {
    let origin = FakeOrigin::spawn([("audio/wave.adf", reply)]).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("audio/wave.adf");
    let coordinator = DownloadCoordinator::new();

    let fetched = fetch_to_cache(&origin.origin(), &coordinator, url(&origin, "audio/wave.adf"), &dest)
        .await
        .unwrap();
    assert_eq!(fetched, Fetched::Downloaded(12));
    assert_eq!(std::fs::read(&dest).unwrap(), b"radio static");
    assert_eq!(files(dir.path()), vec!["audio/wave.adf"]);

    // Idempotent: no second request.
    let fetched = fetch_to_cache(&origin.origin(), &coordinator, url(&origin, "audio/wave.adf"), &dest)
        .await
        .unwrap();
    assert_eq!(fetched, Fetched::AlreadyCached);
    assert_eq!(origin.hits("audio/wave.adf"), 1);
    assert!(coordinator.is_empty());
}

#[tokio::test]
async fn fetch_reports_bad_status() {
    let origin = FakeOrigin::spawn([]).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing.mp3");
    let err = fetch_to_cache(&origin.origin(), &DownloadCoordinator::new(), url(&origin, "missing.mp3"), &dest)
        .await
        .unwrap_err();
    assert!(matches!(&*err, ErrorKind::UpstreamBadStatus(404)));
    assert_eq!(err.to_string(), "status 404");
    assert!(files(dir.path()).is_empty());
}

#[tokio::test]
async fn fetch_of_truncated_body_leaves_nothing_behind() {
    let origin = FakeOrigin::spawn([("cut.mp3", Reply::Truncated(payload(8192)))]).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("cut.mp3");
    let coordinator = DownloadCoordinator::new();
    let err = fetch_to_cache(&origin.origin(), &coordinator, url(&origin, "cut.mp3"), &dest)
        .await
        .unwrap_err();
    assert!(matches!(&*err, ErrorKind::PartialTransfer));
    assert!(files(dir.path()).is_empty());
    assert!(coordinator.is_empty());
}

#[rstest]
#[case::declared(Reply::Ok(payload(64)))]
#[case::undeclared(Reply::Chunked(payload(64)))]
#[tokio::test]
async fn fetch_enforces_size_limit(#[case] reply: Reply) {
    let origin = FakeOrigin::spawn([("big.img", reply)]).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("big.img");
    let err = fetch_to_cache(&origin.origin().with_limit(32), &DownloadCoordinator::new(), url(&origin, "big.img"), &dest)
        .await
        .unwrap_err();
    assert!(matches!(&*err, ErrorKind::UpstreamTooLarge(32)));
    assert!(files(dir.path()).is_empty());
}

#[tokio::test]
async fn fetch_rejects_unknown_encoding() {
    let origin = FakeOrigin::spawn([("a.bin", Reply::Encoded("zstd", payload(16)))]).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("a.bin");
    let err = fetch_to_cache(&origin.origin(), &DownloadCoordinator::new(), url(&origin, "a.bin"), &dest)
        .await
        .unwrap_err();
    assert!(matches!(&*err, ErrorKind::UnsupportedEncoding(e) if e == "zstd"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_hit_origin_once() {
    let body = payload(10_000);
    let origin = FakeOrigin::spawn([("hot.dff", Reply::Slow(Duration::from_millis(200), body.clone()))]).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("hot.dff");
    let coordinator = DownloadCoordinator::new();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let (client, coordinator, target, dest) =
            (origin.origin(), coordinator.clone(), url(&origin, "hot.dff"), dest.clone());
        tasks.spawn(async move { fetch_to_cache(&client, &coordinator, target, &dest).await.unwrap() });
    }
    let mut downloaded = 0;
    while let Some(joined) = tasks.join_next().await {
        if let Fetched::Downloaded(_) = joined.unwrap() {
            downloaded += 1;
        }
    }
    assert_eq!(downloaded, 1);
    assert_eq!(origin.hits("hot.dff"), 1);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn bulk_downloads_then_skips() {
    let origin = FakeOrigin::spawn([
        ("audio/sfx.raw/0.mp3", Reply::Ok(payload(10))),
        ("audio/sfx.raw/10.mp3", Reply::Ok(payload(20))),
        ("audio/sfx.raw/20.mp3", Reply::Chunked(payload(30))),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let base = url(&origin, "audio/sfx.raw");
    let items = ["0.mp3", "10.mp3", "20.mp3"];
    let bulk = BulkDownloader::new(origin.origin(), DownloadCoordinator::new()).with_workers(2);

    let report = bulk.run(items, &base, dir.path(), "sfx").await.unwrap();
    assert_eq!(report, BulkReport { total: 3, downloaded: 3, skipped: 0, failed: 0 });
    assert_eq!(files(dir.path()), vec!["0.mp3", "10.mp3", "20.mp3"]);
    assert_eq!(std::fs::read(dir.path().join("20.mp3")).unwrap(), payload(30));

    let report = bulk.run(items, &base, dir.path(), "sfx").await.unwrap();
    assert_eq!(report, BulkReport { total: 3, downloaded: 0, skipped: 3, failed: 0 });
    assert_eq!(origin.hits("audio/sfx.raw/0.mp3"), 1);
}

#[tokio::test]
async fn bulk_counts_failures_and_keeps_going() {
    let origin = FakeOrigin::spawn([
        ("audio/kchat.adf", Reply::Ok(payload(10))),
        ("audio/wave.adf", Reply::Truncated(payload(4096))),
        ("audio/fever.adf", Reply::Ok(payload(10))),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vrock.adf"), b"already here").unwrap();
    let base = url(&origin, "audio");
    let items = ["kchat.adf", "wave.adf", "fever.adf", "vrock.adf", "emotion.adf"];

    let err = BulkDownloader::new(origin.origin(), DownloadCoordinator::new())
        .run(items, &base, dir.path(), "radio")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "2 of 5 radio files failed to download");
    assert!(err.is_retryable());
    assert_eq!(files(dir.path()), vec!["fever.adf", "kchat.adf", "vrock.adf"]);
    assert_eq!(origin.hits("audio/vrock.adf"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bulk_duplicates_are_fetched_once() {
    let origin = FakeOrigin::spawn([("m/bus.dff", Reply::Slow(Duration::from_millis(100), payload(500)))]).await;
    let dir = tempfile::tempdir().unwrap();
    let report = BulkDownloader::new(origin.origin(), DownloadCoordinator::new())
        .with_workers(4)
        .run(["bus.dff"; 6], &url(&origin, "m"), dir.path(), "assets")
        .await
        .unwrap();
    assert_eq!(report, BulkReport { total: 6, downloaded: 1, skipped: 5, failed: 0 });
    assert_eq!(origin.hits("m/bus.dff"), 1);
}
