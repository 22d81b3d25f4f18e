//! Integration test: local source host + object store, curl fetcher, HTTP
//! relay, full orchestrated run and a resumed second run.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::object_server::ObjectServer;
use ferry_core::config::FetchConfig;
use ferry_core::executor::JobExecutor;
use ferry_core::fetcher::{CurlFetcher, FetchError, Fetcher};
use ferry_core::job::parse_jobs;
use ferry_core::ledger::LedgerStore;
use ferry_core::orchestrator::Orchestrator;
use ferry_core::relay::{HttpRelay, Relay, RelayError, TransferLimits, UploadOutcome};
use tempfile::tempdir;

fn executor(server: &ObjectServer, token: Option<&str>, temp: &std::path::Path) -> Arc<JobExecutor> {
    let relay = HttpRelay::new(server.endpoint(), "media")
        .unwrap()
        .with_token(token.map(str::to_string))
        .with_storage_class(Some("GLACIER_IR".to_string()));
    Arc::new(JobExecutor::new(
        Arc::new(CurlFetcher::new(FetchConfig::default())),
        Arc::new(relay),
        temp,
    ))
}

#[test]
fn curl_fetcher_downloads_body() {
    let server = ObjectServer::start("media", None);
    let body: Vec<u8> = (0u8..=255).cycle().take(100 * 1024).collect();
    let url = server.add_source("a.mp4", body.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.mp4");
    CurlFetcher::new(FetchConfig::default()).fetch(&url, &dest).unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[test]
fn curl_fetcher_reports_http_status() {
    let server = ObjectServer::start("media", None);
    let url = server.add_broken_source("bad.mp4");
    let dir = tempdir().unwrap();
    match CurlFetcher::new(FetchConfig::default()).fetch(&url, &dir.path().join("bad.mp4")) {
        Err(FetchError::Http(500)) => {}
        other => panic!("expected HTTP 500, got {:?}", other),
    }
}

#[test]
fn http_relay_uploads_with_metadata_headers() {
    let server = ObjectServer::start("media", Some("s3cret"));
    let relay = HttpRelay::new(server.endpoint(), "media")
        .unwrap()
        .with_token(Some("s3cret".to_string()))
        .with_storage_class(Some("GLACIER_IR".to_string()));
    let dir = tempdir().unwrap();
    let src = dir.path().join("ep 1.mp4");
    std::fs::write(&src, b"video bytes").unwrap();

    assert!(!relay.exists("shows/ep 1.mp4").unwrap());
    match relay.upload(&src, "shows/ep 1.mp4", "video/mp4").unwrap() {
        UploadOutcome::Uploaded { sha256, .. } => assert_eq!(sha256.len(), 64),
        other => panic!("expected upload, got {:?}", other),
    }
    assert_eq!(server.object("shows/ep 1.mp4").unwrap(), b"video bytes");
    assert_eq!(server.put_header("shows/ep 1.mp4", "content-type").as_deref(), Some("video/mp4"));
    assert_eq!(
        server.put_header("shows/ep 1.mp4", "x-amz-storage-class").as_deref(),
        Some("GLACIER_IR")
    );
    assert!(relay.exists("shows/ep 1.mp4").unwrap());
    assert!(matches!(
        relay.upload(&src, "shows/ep 1.mp4", "video/mp4").unwrap(),
        UploadOutcome::AlreadyExists
    ));
    relay.check().unwrap();
}

#[test]
fn http_relay_maps_rejected_credentials_to_auth_error() {
    let server = ObjectServer::start("media", Some("s3cret"));
    let relay = HttpRelay::new(server.endpoint(), "media")
        .unwrap()
        .with_token(Some("wrong".to_string()));
    assert!(matches!(relay.exists("x.mp4"), Err(RelayError::Auth(403))));
    assert!(matches!(relay.check(), Err(RelayError::Auth(403))));
}

#[test]
fn http_relay_upload_does_not_overwrite_existing_object() {
    let server = ObjectServer::start("media", None);
    server.put_object("shows/e2.mp4", b"original".to_vec());
    let relay = HttpRelay::new(server.endpoint(), "media").unwrap();
    let dir = tempdir().unwrap();
    let src = dir.path().join("e2.mp4");
    std::fs::write(&src, b"replacement").unwrap();

    // Upload alone (no prior existence check) must still not clobber the key.
    assert!(matches!(
        relay.upload(&src, "shows/e2.mp4", "video/mp4").unwrap(),
        UploadOutcome::AlreadyExists
    ));
    assert_eq!(server.object("shows/e2.mp4").unwrap(), b"original");
    assert_eq!(server.put_header("shows/e2.mp4", "if-none-match"), None);

    std::fs::write(&src, b"fresh").unwrap();
    relay.upload(&src, "shows/e3.mp4", "video/mp4").unwrap();
    assert_eq!(server.put_header("shows/e3.mp4", "if-none-match").as_deref(), Some("*"));
}

#[test]
fn http_relay_aborts_upload_to_unresponsive_store() {
    let endpoint = common::stall_server::start(Duration::from_secs(30));
    let relay = HttpRelay::new(&endpoint, "media").unwrap().with_limits(TransferLimits {
        connect_timeout: Duration::from_secs(5),
        low_speed_limit_bytes: 1024,
        low_speed_time: Duration::from_secs(1),
    });
    let dir = tempdir().unwrap();
    let src = dir.path().join("big.mp4");
    std::fs::write(&src, vec![7u8; 64 * 1024]).unwrap();

    let started = Instant::now();
    let err = relay.upload(&src, "shows/big.mp4", "video/mp4").unwrap_err();
    assert!(matches!(err, RelayError::Connectivity(_)), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(20), "{:?}", started.elapsed());
}

#[tokio::test]
async fn orchestrated_run_relays_and_resumes() {
    let server = ObjectServer::start("media", Some("tok"));
    let mut entries = Vec::new();
    for i in 0..6u64 {
        let url = if i == 4 {
            server.add_broken_source("4.mp4")
        } else {
            server.add_source(&format!("{i}.mp4"), format!("episode {i}").into_bytes())
        };
        entries.push(format!(
            r#"{{"index":{i},"title":"Show","downloadUrl":"{url}","s3Path":"show/s1/{i}.mp4","globalEpisodeNumber":{}}}"#,
            i + 1
        ));
    }
    // Already on the store from some earlier tool: skipped without a download.
    server.put_object("show/s1/5.mp4", b"old".to_vec());
    let jobs = parse_jobs(&format!("[{}]", entries.join(","))).unwrap();

    let state = tempdir().unwrap();
    let temp = tempdir().unwrap();
    let store = LedgerStore::in_dir(state.path());
    let orch = Orchestrator::new(executor(&server, Some("tok"), temp.path()), store.clone(), 3);
    let summary = orch.run(&jobs).await.unwrap();

    assert_eq!(summary.processed, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.remaining, 1);
    assert_eq!(summary.this_run.skipped, 1);
    assert_eq!(server.object("show/s1/2.mp4").unwrap(), b"episode 2");
    assert_eq!(server.object("show/s1/5.mp4").unwrap(), b"old");
    assert!(!server.gets().contains(&"5.mp4".to_string()));
    let ledger = store.load().unwrap().unwrap();
    assert_eq!(ledger.completed_jobs.len(), 5);
    assert!(!ledger.completed_jobs.contains(&4));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);

    // Source comes back; the second run touches only the failed job.
    server.add_source("4.mp4", b"episode 4".to_vec());
    let gets_before = server.gets().len();
    let orch = Orchestrator::new(executor(&server, Some("tok"), temp.path()), store.clone(), 3);
    let summary = orch.run(&jobs).await.unwrap();
    assert_eq!(summary.this_run.dispatched, 1);
    assert_eq!(summary.remaining, 0);
    assert_eq!(server.gets().len(), gets_before + 1);
    assert_eq!(server.object("show/s1/4.mp4").unwrap(), b"episode 4");
}
