use appcursor::collector::{CollectionError, Collector};
use appcursor::model::InventoryItem;
use appcursor::{InventoryStore, ScanOrchestrator, ScanOutcome, ScanState, StatusTracker};
use async_trait::async_trait;
use std::sync::Arc;
use std::thread;

struct FixedCollector(Vec<InventoryItem>);

#[async_trait]
impl Collector for FixedCollector {
    async fn collect(&self) -> Result<Vec<InventoryItem>, CollectionError> {
        Ok(self.0.clone())
    }
}

struct FailingCollector;

#[async_trait]
impl Collector for FailingCollector {
    async fn collect(&self) -> Result<Vec<InventoryItem>, CollectionError> {
        Err(CollectionError::Failed("registry unavailable".to_string()))
    }
}

fn items(n: usize) -> Vec<InventoryItem> {
    (0..n)
        .map(|i| {
            InventoryItem::new(
                &format!("App {:02}", i),
                "1.0",
                &format!("/opt/app{}", i),
                "2024-01-01",
            )
        })
        .collect()
}

fn orchestrator(collector: impl Collector + 'static) -> ScanOrchestrator {
    ScanOrchestrator::new(
        Arc::new(InventoryStore::open_in_memory().unwrap()),
        Arc::new(StatusTracker::new()),
        Arc::new(collector),
    )
}

#[tokio::test]
async fn test_successful_scan_persists_everything() {
    let orchestrator = orchestrator(FixedCollector(items(5)));
    let before = orchestrator.fetch_cached_inventory().unwrap().len();

    let outcome = orchestrator.run_scan().await;

    assert_eq!(outcome, ScanOutcome::Completed { count: 5 });
    assert_eq!(orchestrator.fetch_cached_inventory().unwrap().len(), before + 5);

    let scans = orchestrator.store().fetch_scan_results().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].status, "success");
    assert_eq!(scans[0].scan_type, "system");
    let details: serde_json::Value = serde_json::from_str(&scans[0].details).unwrap();
    assert_eq!(details["apps"], 5);

    let status = orchestrator.status();
    assert_eq!(status.state, ScanState::Idle);
    assert_eq!(status.progress, 100);
    assert!(status.last_scan.is_some());
}

#[tokio::test]
async fn test_failed_scan_is_recorded() {
    let orchestrator = orchestrator(FailingCollector);

    let outcome = orchestrator.run_scan().await;

    assert!(matches!(outcome, ScanOutcome::Failed { ref message } if message.contains("registry unavailable")));
    assert!(orchestrator.fetch_cached_inventory().unwrap().is_empty());

    let scans = orchestrator.store().fetch_scan_results().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].status, "failed");
    assert!(scans[0].details.contains("registry unavailable"));

    let status = orchestrator.status();
    assert_eq!(status.state, ScanState::Error);
    assert_eq!(status.progress, 0);
}

#[tokio::test]
async fn test_repeated_scans_keep_history() {
    let orchestrator = orchestrator(FixedCollector(items(2)));

    orchestrator.run_scan().await;
    orchestrator.run_scan().await;

    let apps = orchestrator.fetch_cached_inventory().unwrap();
    assert_eq!(apps.len(), 4);
    assert_eq!(apps[0].name, apps[1].name);
    assert_eq!(orchestrator.store().fetch_scan_results().unwrap().len(), 2);
}

#[tokio::test]
async fn test_recovers_from_error_state() {
    let store = Arc::new(InventoryStore::open_in_memory().unwrap());
    let status = Arc::new(StatusTracker::new());

    let failing = ScanOrchestrator::new(Arc::clone(&store), Arc::clone(&status), Arc::new(FailingCollector));
    failing.run_scan().await;
    assert_eq!(status.snapshot().state, ScanState::Error);

    let working = ScanOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&status),
        Arc::new(FixedCollector(items(1))),
    );
    assert_eq!(working.run_scan().await, ScanOutcome::Completed { count: 1 });
    assert_eq!(status.snapshot().state, ScanState::Idle);
    assert_eq!(store.fetch_scan_results().unwrap().len(), 2);
}

#[test]
fn test_concurrent_inserts_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InventoryStore::open(dir.path().join("storage.db")).unwrap());

    let workers: Vec<_> = (0..2)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    store
                        .insert_application(
                            &format!("w{}-{:02}", worker, i),
                            "1.0",
                            "/opt",
                            "2024-01-01",
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(store.fetch_applications().unwrap().len(), 100);
}

#[test]
fn test_applications_sorted_by_name() {
    let store = InventoryStore::open_in_memory().unwrap();
    store
        .insert_application("Bar", "2.0", "C:\\Bar", "2024-01-02")
        .unwrap();
    store
        .insert_application("Foo", "1.0", "C:\\Foo", "2024-01-01")
        .unwrap();

    let names: Vec<_> = store
        .fetch_applications()
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, ["Bar", "Foo"]);
}
