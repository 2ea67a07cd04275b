//! Spec §8 scenarios driven through the real wiring (`Railyard::new`)
//! rather than each component crate's own scripted doubles — this is the
//! umbrella crate's distinct coverage: that the pieces actually fit
//! together, not just that each one works in isolation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use railyard::{FsStoreConfig, PoolConfig, RailyardConfig, Railyard, RetryConfig, TimeoutsConfig, WorkerBackend};
use railyard_core::{ModuleGraph, TestEntry, TestFile, WorkerLimit};
use railyard_test::{RecordingLogger, ScriptedCompiler};

fn test_file(content: &str) -> TestFile {
    TestFile {
        path: PathBuf::from("/virtual/entry.js"),
        content: content.as_bytes().to_vec(),
        dependencies: ModuleGraph::new(),
    }
}

fn config(artifact_root: PathBuf, worker_limit: WorkerLimit) -> RailyardConfig {
    RailyardConfig {
        pool: PoolConfig {
            worker_limit,
            restart_worker: false,
        },
        retry: RetryConfig::default(),
        timeouts: TimeoutsConfig {
            test_timeout: Duration::from_secs(5),
            ..TimeoutsConfig::default()
        },
        fs_store: FsStoreConfig {
            thread_count: 4,
            artifact_root,
        },
        debug: Default::default(),
    }
}

#[tokio::test]
async fn happy_single_test_runs_to_success() {
    let dir = tempfile::tempdir().unwrap();
    let logger = RecordingLogger::new();
    let railyard = Railyard::new(
        config(dir.path().to_path_buf(), WorkerLimit::Count(1)),
        WorkerBackend::Local {
            compiler: Arc::new(ScriptedCompiler::new()),
        },
        Box::new(logger.clone()),
        Arc::new(railyard_test::FakeClock::new()),
        None,
    )
    .await;

    let entry = TestEntry::new(test_file("module.exports = function() { return 'ok'; };"));
    let outcome = railyard.run_queue(vec![entry]).await;

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.stats.passed, 1);
    assert_eq!(outcome.stats.failed, 0);
}

#[tokio::test]
async fn sandbox_failure_is_reported_with_retries_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let railyard = Railyard::new(
        config(dir.path().to_path_buf(), WorkerLimit::Count(1)),
        WorkerBackend::Local {
            compiler: Arc::new(ScriptedCompiler::new()),
        },
        Box::new(RecordingLogger::new()),
        Arc::new(railyard_test::FakeClock::new()),
        None,
    )
    .await;

    let entry = TestEntry::new(test_file("module.exports = function() { throw new Error('boom'); };"));
    let outcome = railyard.run_queue(vec![entry]).await;

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].error_kind, "SandboxError");
    assert_eq!(outcome.stats.failed, 1);
}

#[tokio::test]
async fn worker_limit_zero_dispatches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let railyard = Railyard::new(
        config(dir.path().to_path_buf(), WorkerLimit::Count(0)),
        WorkerBackend::Local {
            compiler: Arc::new(ScriptedCompiler::new()),
        },
        Box::new(RecordingLogger::new()),
        Arc::new(railyard_test::FakeClock::new()),
        None,
    )
    .await;

    let entry = TestEntry::new(test_file("module.exports = function() { return 1; };"));
    let outcome = railyard.run_queue(vec![entry]).await;

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.stats.passed, 0);
    assert_eq!(outcome.stats.failed, 0);
}

#[tokio::test]
async fn empty_queue_returns_immediately_with_no_errors() {
    let dir = tempfile::tempdir().unwrap();
    let railyard = Railyard::new(
        config(dir.path().to_path_buf(), WorkerLimit::Count(2)),
        WorkerBackend::Local {
            compiler: Arc::new(ScriptedCompiler::new()),
        },
        Box::new(RecordingLogger::new()),
        Arc::new(railyard_test::FakeClock::new()),
        None,
    )
    .await;

    let outcome = railyard.run_queue(Vec::new()).await;
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn fs_store_client_is_reachable_from_the_wired_instance() {
    let dir = tempfile::tempdir().unwrap();
    let railyard = Railyard::new(
        config(dir.path().to_path_buf(), WorkerLimit::Count(1)),
        WorkerBackend::Local {
            compiler: Arc::new(ScriptedCompiler::new()),
        },
        Box::new(RecordingLogger::new()),
        Arc::new(railyard_test::FakeClock::new()),
        None,
    )
    .await;

    let client = railyard.fs_store_client("w1");
    let token = client
        .acquire(
            railyard_core::FileAction::Lock,
            railyard_core::FileMeta {
                file_name: Some("a.log".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    client.release(&token).await;
}
