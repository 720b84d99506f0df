use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use watch_core::{CycleMode, CycleStage, EventKind, JobRecord, NotificationRecord, Report};
use watch_engine::{
    AuthError, ContentFetcher, CycleError, CycleSettings, FailureKind, FetchError,
    JsonSnapshotStore, MailTransport, Notifier, Orchestrator, PortalExtractor, SessionProvider,
    SnapshotStore, TransportError,
};

const PORTAL_PAGE: &str = r#"<html><body>
  <div id="job-listings_wrapper"><table><tbody>
    <tr><td>Acme</td><td>2024-01-01</td><td>2023-12-01</td><td><a href="/j/1">View</a></td></tr>
  </tbody></table></div>
  <div id="newseventsx1"><table><tbody>
    <tr><td><a href="/n/1">Results declared</a></td><td>Notice</td><td>2023-12-02</td></tr>
  </tbody></table></div>
</body></html>"#;

struct FakeSession {
    released: Arc<AtomicUsize>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default, Clone)]
struct FakeProvider {
    released: Arc<AtomicUsize>,
    reject: bool,
}

#[async_trait::async_trait]
impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    async fn authenticate(&self) -> Result<FakeSession, AuthError> {
        if self.reject {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(FakeSession {
            released: Arc::clone(&self.released),
        })
    }
}

struct FakeFetcher {
    result: Result<String, FetchError>,
}

impl FakeFetcher {
    fn serving(markup: &str) -> Self {
        Self {
            result: Ok(markup.to_string()),
        }
    }

    fn timing_out() -> Self {
        Self {
            result: Err(FetchError {
                kind: FailureKind::ContentNotReady {
                    missing: vec!["#job-listings_wrapper".into()],
                },
                message: "content regions did not appear".into(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl ContentFetcher<FakeSession> for FakeFetcher {
    async fn fetch(&self, _session: &FakeSession, _url: &str) -> Result<String, FetchError> {
        self.result.clone()
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Report>>,
    fail: bool,
}

impl RecordingTransport {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|report| report.subject.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(&self, _recipients: &[String], report: &Report) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Smtp("connection refused".into()));
        }
        self.sent.lock().unwrap().push(report.clone());
        Ok(())
    }
}

type TestOrchestrator =
    Orchestrator<FakeProvider, FakeFetcher, JsonSnapshotStore, Arc<RecordingTransport>>;

struct Harness {
    _temp: TempDir,
    store: JsonSnapshotStore,
    provider: FakeProvider,
    transport: Arc<RecordingTransport>,
}

impl Harness {
    fn new() -> Self {
        Self::with(FakeProvider::default(), RecordingTransport::default())
    }

    fn with(provider: FakeProvider, transport: RecordingTransport) -> Self {
        watch_logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(temp.path().join("data"));
        Self {
            _temp: temp,
            store,
            provider,
            transport: Arc::new(transport),
        }
    }

    fn orchestrator(&self, fetcher: FakeFetcher) -> TestOrchestrator {
        self.orchestrator_for(fetcher, vec!["ops@example.com".into()])
    }

    fn orchestrator_for(&self, fetcher: FakeFetcher, recipients: Vec<String>) -> TestOrchestrator {
        Orchestrator::new(
            self.provider.clone(),
            fetcher,
            PortalExtractor::default(),
            self.store.clone(),
            Notifier::new(Arc::clone(&self.transport), recipients),
            CycleSettings::new("https://tp.bitmesra.co.in/index.php/dashboard")
                .with_clock(Arc::new(|| "2024-01-02T03:04:05+00:00".to_string())),
        )
    }

    fn released(&self) -> usize {
        self.provider.released.load(Ordering::SeqCst)
    }

    fn snapshot_bytes(&self) -> (Vec<u8>, Vec<u8>) {
        (
            fs::read(self.store.path_for::<JobRecord>()).unwrap(),
            fs::read(self.store.path_for::<NotificationRecord>()).unwrap(),
        )
    }
}

fn old_job() -> JobRecord {
    JobRecord {
        company: "Old Co".into(),
        deadline: "2023-01-01".into(),
        posted_date: "2022-12-01".into(),
        link: None,
    }
}

#[tokio::test]
async fn first_cycle_reports_each_new_category() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));

    let outcome = orchestrator.run_cycle(CycleMode::Incremental).await.unwrap();

    assert_eq!(outcome.new_jobs, 1);
    assert_eq!(outcome.new_notifications, 1);
    assert_eq!(
        outcome.dispatched,
        vec![EventKind::NewJobs, EventKind::NewNotifications]
    );
    assert_eq!(
        harness.transport.subjects(),
        vec!["New Job Listings Found", "New Notifications Found"]
    );
    let sent = harness.transport.sent.lock().unwrap().clone();
    assert!(sent[0].html.contains("Acme"));
    assert!(!sent[0].html.contains("Results declared"));

    let stored: Vec<JobRecord> = harness.store.read().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].link.as_deref(),
        Some("https://tp.bitmesra.co.in/j/1")
    );
    assert_eq!(harness.released(), 1);
}

#[tokio::test]
async fn unchanged_page_sends_all_clear() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));

    orchestrator.run_cycle(CycleMode::Incremental).await.unwrap();
    let second = orchestrator.run_cycle(CycleMode::Incremental).await.unwrap();

    assert!(!second.found_new());
    assert_eq!(second.dispatched, vec![EventKind::NoUpdates]);
    assert_eq!(
        harness.transport.subjects().last().map(String::as_str),
        Some("No New Updates Found")
    );
    assert_eq!(orchestrator.cycles_run(), 2);
    assert_eq!(harness.released(), 2);
}

#[tokio::test]
async fn fetch_failure_leaves_snapshots_untouched() {
    let harness = Harness::new();
    harness.store.write(&[old_job()]).unwrap();
    harness.store.write::<NotificationRecord>(&[]).unwrap();
    let before = harness.snapshot_bytes();

    let orchestrator = harness.orchestrator(FakeFetcher::timing_out());
    let err = orchestrator
        .run_cycle(CycleMode::Incremental)
        .await
        .unwrap_err();

    assert!(matches!(err, CycleError::Fetch(_)));
    assert_eq!(err.stage(), CycleStage::Fetching);
    assert_eq!(harness.snapshot_bytes(), before);
    assert!(harness.transport.subjects().is_empty());
    assert_eq!(harness.released(), 1);
}

#[tokio::test]
async fn auth_failure_sends_and_writes_nothing() {
    let harness = Harness::with(
        FakeProvider {
            reject: true,
            ..FakeProvider::default()
        },
        RecordingTransport::default(),
    );
    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));

    let err = orchestrator
        .run_cycle(CycleMode::Incremental)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), CycleStage::Authenticating);
    assert!(harness.transport.subjects().is_empty());
    assert!(!harness.store.dir().exists());
}

#[tokio::test]
async fn delivery_failure_still_persists() {
    let harness = Harness::with(FakeProvider::default(), RecordingTransport::failing());
    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));

    let outcome = orchestrator.run_cycle(CycleMode::Incremental).await.unwrap();

    assert_eq!(outcome.delivery_failures, 2);
    assert_eq!(harness.store.read::<JobRecord>().unwrap().len(), 1);
    assert_eq!(harness.store.read::<NotificationRecord>().unwrap().len(), 1);
}

#[tokio::test]
async fn no_recipients_skips_mail_but_persists() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator_for(FakeFetcher::serving(PORTAL_PAGE), Vec::new());

    let outcome = orchestrator.run_cycle(CycleMode::Incremental).await.unwrap();

    assert_eq!(outcome.delivery_failures, 0);
    assert!(harness.transport.subjects().is_empty());
    assert_eq!(harness.store.read::<JobRecord>().unwrap().len(), 1);
}

#[tokio::test]
async fn corrupt_snapshot_aborts_before_notifying() {
    let harness = Harness::new();
    fs::create_dir_all(harness.store.dir()).unwrap();
    fs::write(harness.store.path_for::<JobRecord>(), "not json").unwrap();

    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));
    let err = orchestrator
        .run_cycle(CycleMode::Incremental)
        .await
        .unwrap_err();

    assert!(matches!(err, CycleError::SnapshotRead(_)));
    assert!(harness.transport.subjects().is_empty());
    assert_eq!(
        fs::read_to_string(harness.store.path_for::<JobRecord>()).unwrap(),
        "not json"
    );
    assert!(!harness.store.path_for::<NotificationRecord>().exists());
    assert_eq!(harness.released(), 1);
}

#[tokio::test]
async fn failed_snapshot_write_still_saves_the_other_kind() {
    let harness = Harness::new();
    // A directory in place of the jobs file makes the rename onto it fail.
    fs::create_dir_all(harness.store.path_for::<JobRecord>()).unwrap();

    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));
    let err = orchestrator.run_cycle(CycleMode::Bootstrap).await.unwrap_err();

    assert!(matches!(err, CycleError::SnapshotWrite(_)));
    assert_eq!(err.stage(), CycleStage::Persisting);
    assert_eq!(harness.released(), 1);
    assert_eq!(harness.transport.subjects(), vec!["Initial Scrape Complete"]);
    assert_eq!(
        harness.store.read::<NotificationRecord>().unwrap().len(),
        1
    );
    assert!(harness.store.path_for::<JobRecord>().is_dir());
}

#[tokio::test]
async fn bootstrap_reports_everything_and_overwrites_history() {
    let harness = Harness::new();
    let acme = PortalExtractor::default().extract(PORTAL_PAGE).jobs;
    harness.store.write(&[old_job(), acme[0].clone()]).unwrap();

    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));
    let outcome = orchestrator.run_cycle(CycleMode::Bootstrap).await.unwrap();

    assert_eq!(outcome.new_jobs, 1);
    assert_eq!(outcome.new_notifications, 1);
    assert_eq!(outcome.dispatched, vec![EventKind::InitialScrape]);
    let sent = harness.transport.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("Acme"));
    assert!(sent[0].html.contains("Results declared"));

    assert_eq!(harness.store.read::<JobRecord>().unwrap(), acme);
}

#[tokio::test(start_paused = true)]
async fn schedule_survives_failed_cycles_until_shutdown() {
    let harness = Harness::with(
        FakeProvider {
            reject: true,
            ..FakeProvider::default()
        },
        RecordingTransport::default(),
    );
    let orchestrator = harness.orchestrator(FakeFetcher::serving(PORTAL_PAGE));

    orchestrator
        .run_forever(
            Duration::from_secs(60),
            tokio::time::sleep(Duration::from_secs(150)),
        )
        .await;

    // Ticks at 0s, 60s and 120s; shutdown at 150s.
    assert_eq!(orchestrator.cycles_run(), 3);
    assert!(harness.transport.subjects().is_empty());
}
