//! Cleanup coordination and error precedence.
//!
//! These tests run a graph, tear down with the coordinator and settle the
//! two outcomes the way a harvesting session does.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mock_harvest::cleanup::{settle, CleanupCoordinator};
use mock_harvest::core::TaskGraph;
use mock_harvest::orchestration::GraphExecutor;
use mock_harvest::Error;

fn failure(operation: &str) -> Error {
    Error::RemoteCall {
        operation: operation.to_string(),
        status: Some(500),
        message: "scripted failure".to_string(),
    }
}

/// Ids the cleanup needs, taken from the partial store.
#[derive(Debug, Default)]
struct Created {
    ids: Vec<u32>,
}

/// Cleanup set counting its runs and optionally failing.
fn coordinator(
    runs: &Arc<AtomicUsize>,
    seen: &Arc<Mutex<Vec<u32>>>,
    fail: bool,
) -> CleanupCoordinator<Created> {
    let runs = runs.clone();
    let seen = seen.clone();
    CleanupCoordinator::new()
        .action("deleteCreated", move |created: Arc<Created>| {
            let runs = runs.clone();
            let seen = seen.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().extend(created.ids.iter().copied());
                if fail {
                    Err(failure("deleteCreated"))
                } else {
                    Ok(())
                }
            }
        })
        .action("noop", |_| async { Ok(()) })
}

/// Test: Cleanup sees in-flight results
/// Given a creation still running when a sibling fails
/// When the graph settles and cleanup runs
/// Then the created id reaches cleanup and the main error wins
#[tokio::test]
async fn test_cleanup_sees_ids_created_before_failure() {
    let graph = TaskGraph::<u32>::builder()
        .task("create", &[], |_| async {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            Ok(42)
        })
        .task("broken", &[], |_| async { Err(failure("broken")) })
        .task("read", &["create", "broken"], |_| async { Ok(0) })
        .build()
        .unwrap();

    let outcome = GraphExecutor::new(graph).run().await;
    let created = Created {
        ids: outcome.store().get("create").copied().into_iter().collect(),
    };

    let runs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let report = coordinator(&runs, &seen, true).run(created).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![42]);
    assert!(!report.is_success());

    let err = settle(outcome, report).unwrap_err();
    assert!(matches!(err, Error::RemoteCall { ref operation, .. } if operation == "broken"));
}

/// Test: Cleanup error alone is surfaced
#[tokio::test]
async fn test_cleanup_error_surfaces_after_success() {
    let graph = TaskGraph::<u32>::builder()
        .task("create", &[], |_| async { Ok(7) })
        .build()
        .unwrap();
    let outcome = GraphExecutor::new(graph).run().await;

    let runs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let report = coordinator(&runs, &seen, true)
        .run(Created { ids: vec![7] })
        .await;
    assert_eq!(report.succeeded, vec!["noop".to_string()]);

    match settle(outcome, report) {
        Err(Error::Cleanup(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].action, "deleteCreated");
        }
        other => panic!("unexpected: {:?}", other.map(|s| s.len())),
    }
}

/// Test: Clean run returns the store
#[tokio::test]
async fn test_clean_run_settles_to_store() {
    let graph = TaskGraph::<u32>::builder()
        .task("create", &[], |_| async { Ok(7) })
        .build()
        .unwrap();
    let outcome = GraphExecutor::new(graph).run().await;

    let runs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let report = coordinator(&runs, &seen, false)
        .run(Created::default())
        .await;

    let store = settle(outcome, report).unwrap();
    assert_eq!(store.get("create"), Some(&7));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
