//! `RemoteWorker` against a real child process (spec §4.G default
//! backend) rather than the scripted doubles every other worker test
//! uses — this is the only test that actually spawns the IPC pipe pair
//! and exercises the `worker.execute`/`worker.outcome` round trip end to
//! end, which is what caught the request-id correlation it now pins down.

use std::path::PathBuf;

use railyard_core::{ModuleGraph, Parameters, TestFile};
use railyard_supervisor::{ProcessRegistry, Supervisor};
use railyard_transport::Transport;
use railyard_worker::{Outcome, RemoteWorker};

fn test_file(content: &str) -> TestFile {
    TestFile {
        path: PathBuf::from("/virtual/entry.js"),
        content: content.as_bytes().to_vec(),
        dependencies: ModuleGraph::new(),
    }
}

async fn spawn_remote_worker() -> RemoteWorker {
    let dir = tempfile::tempdir().unwrap();
    let registry = ProcessRegistry::new(dir.path().join("registry.json"));
    let supervisor = Supervisor::new(std::sync::Arc::new(registry));
    let transport = Transport::new_root();

    RemoteWorker::spawn(
        &supervisor,
        transport,
        env!("CARGO_BIN_EXE_worker_process_harness"),
        &[],
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn execute_round_trips_through_a_real_child_process() {
    let worker = spawn_remote_worker().await;

    let outcome = worker
        .execute(
            test_file("module.exports = function() { return 'ok'; };"),
            Parameters::new(),
            Parameters::new(),
        )
        .await;

    assert!(outcome.is_success(), "expected success, got {outcome:?}");
    assert!(matches!(outcome, Outcome::Success(v) if v == "ok"));

    worker.kill(None).await.unwrap();
}

#[tokio::test]
async fn a_failing_test_also_resolves_instead_of_hanging() {
    let worker = spawn_remote_worker().await;

    let outcome = worker
        .execute(
            test_file("module.exports = function() { throw new Error('boom'); };"),
            Parameters::new(),
            Parameters::new(),
        )
        .await;

    assert!(!outcome.is_success());

    worker.kill(None).await.unwrap();
}
