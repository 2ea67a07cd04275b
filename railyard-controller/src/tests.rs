//! End-to-end scenarios from spec §8, driven against a scripted
//! [`Worker`] double instead of a real sandbox/child process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use railyard_core::{Clock, Logger, ModuleGraph, RailyardError, TestEntry, TestFile, WorkerLimit};
use railyard_transport::Transport;
use railyard_worker::{Outcome, Worker};

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::factory::WorkerFactory;
use crate::hooks;

struct RealtimeClock;

#[async_trait]
impl Clock for RealtimeClock {
    fn now_millis(&self) -> u64 {
        0
    }
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct NullLogger;

impl Logger for NullLogger {
    fn with_prefix(&self, _prefix: &str) -> Box<dyn Logger> {
        Box::new(NullLogger)
    }
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

fn test_file(name: &str) -> TestFile {
    TestFile {
        path: PathBuf::from(name),
        content: Vec::new(),
        dependencies: ModuleGraph::new(),
    }
}

fn entry(name: &str) -> TestEntry {
    TestEntry::new(test_file(name))
}

#[derive(Clone)]
enum Attempt {
    Success,
    SuccessAfter(Duration),
    Fail,
    Crash,
    FatalTransport,
}

type Script = Arc<dyn Fn(&str, u32) -> Attempt + Send + Sync>;

struct ScriptedWorker {
    worker_id: String,
    transport: Transport,
    script: Script,
    attempts: Arc<StdMutex<HashMap<String, u32>>>,
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn worker_id(&self) -> &str {
        &self.worker_id
    }

    async fn execute(
        &self,
        file: TestFile,
        _parameters: railyard_core::Parameters,
        _env_parameters: railyard_core::Parameters,
    ) -> Outcome {
        let path = file.path.display().to_string();
        let attempt_no = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(path.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        match (self.script)(&path, attempt_no) {
            Attempt::Success => Outcome::Success(serde_json::json!(true)),
            Attempt::SuccessAfter(delay) => {
                tokio::time::sleep(delay).await;
                Outcome::Success(serde_json::json!(true))
            }
            Attempt::Fail => Outcome::Failure(RailyardError::SandboxError("boom".to_string())),
            Attempt::FatalTransport => {
                Outcome::Failure(RailyardError::TransportError("connection reset".to_string()))
            }
            Attempt::Crash => {
                self.transport.peer_lost(&self.worker_id).await;
                std::future::pending::<Outcome>().await
            }
        }
    }

    async fn kill(&self, _signal: Option<i32>) -> Result<(), RailyardError> {
        Ok(())
    }
}

struct ScriptedFactory {
    transport: Transport,
    script: Script,
    attempts: Arc<StdMutex<HashMap<String, u32>>>,
    next_id: AtomicU32,
}

impl ScriptedFactory {
    fn new(transport: Transport, script: Script) -> Arc<Self> {
        Arc::new(Self {
            transport,
            script,
            attempts: Arc::new(StdMutex::new(HashMap::new())),
            next_id: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl WorkerFactory for ScriptedFactory {
    async fn spawn_worker(&self) -> Result<Arc<dyn Worker>, RailyardError> {
        let id = format!("scripted-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(Arc::new(ScriptedWorker {
            worker_id: id,
            transport: self.transport.clone(),
            script: self.script.clone(),
            attempts: self.attempts.clone(),
        }))
    }
}

fn controller(factory: Arc<ScriptedFactory>, config: ControllerConfig) -> Controller {
    Controller::new(
        config,
        factory.clone(),
        Arc::new(RealtimeClock),
        Box::new(NullLogger),
        factory.transport.clone(),
    )
}

#[tokio::test]
async fn happy_single_test_passes_with_ordered_hooks() {
    let transport = Transport::new_root();
    let factory = ScriptedFactory::new(transport, Arc::new(|_p, _a| Attempt::Success));
    let config = ControllerConfig {
        worker_limit: WorkerLimit::Count(1),
        ..Default::default()
    };
    let controller = controller(factory, config);

    let order = Arc::new(StdMutex::new(Vec::new()));
    let o1 = order.clone();
    controller
        .hooks()
        .before_run
        .register_read(hooks::BEFORE_RUN, "order", move |_v, _ctx| {
            let order = o1.clone();
            async move {
                order.lock().unwrap().push("beforeRun");
            }
        })
        .await
        .unwrap();
    let o2 = order.clone();
    controller
        .hooks()
        .before_test
        .register_read(hooks::BEFORE_TEST, "order", move |_v, _ctx| {
            let order = o2.clone();
            async move {
                order.lock().unwrap().push("beforeTest");
            }
        })
        .await
        .unwrap();
    let o3 = order.clone();
    controller
        .hooks()
        .after_test
        .register_read(hooks::AFTER_TEST, "order", move |_v, _ctx| {
            let order = o3.clone();
            async move {
                order.lock().unwrap().push("afterTest");
            }
        })
        .await
        .unwrap();
    let o4 = order.clone();
    controller
        .hooks()
        .after_run
        .register_read(hooks::AFTER_RUN, "order", move |_v, _ctx| {
            let order = o4.clone();
            async move {
                order.lock().unwrap().push("afterRun");
            }
        })
        .await
        .unwrap();

    let outcome = controller.run_queue(vec![entry("t1.js")]).await;

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.stats.passed, 1);
    assert_eq!(
        *order.lock().unwrap(),
        vec!["beforeRun", "beforeTest", "afterTest", "afterRun"]
    );
}

#[tokio::test]
async fn retry_once_then_pass() {
    let transport = Transport::new_root();
    let factory = ScriptedFactory::new(
        transport,
        Arc::new(|_p, attempt_no| if attempt_no == 1 { Attempt::Fail } else { Attempt::Success }),
    );
    let config = ControllerConfig {
        worker_limit: WorkerLimit::Count(1),
        retry_count: 2,
        retry_delay: Duration::from_millis(10),
        ..Default::default()
    };
    let controller = controller(factory, config);

    let retry_fires = Arc::new(AtomicU32::new(0));
    let retry_fires2 = retry_fires.clone();
    controller
        .hooks()
        .before_test_retry
        .register_read(hooks::BEFORE_TEST_RETRY, "count", move |_v, _ctx| {
            let retry_fires = retry_fires2.clone();
            async move {
                retry_fires.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

    let outcome = controller.run_queue(vec![entry("t1.js")]).await;

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.stats.passed, 1);
    assert_eq!(outcome.stats.retried, 1);
    assert_eq!(retry_fires.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bail_on_failure_cancels_in_flight_and_skips_unstarted() {
    let transport = Transport::new_root();
    let factory = ScriptedFactory::new(
        transport,
        Arc::new(|path, _attempt| {
            if path.ends_with("t1.js") {
                Attempt::Fail
            } else {
                Attempt::SuccessAfter(Duration::from_millis(200))
            }
        }),
    );
    let config = ControllerConfig {
        worker_limit: WorkerLimit::Count(2),
        bail: true,
        ..Default::default()
    };
    let controller = controller(factory, config);

    let outcome = controller
        .run_queue(vec![entry("t1.js"), entry("t2.js"), entry("t3.js")])
        .await;

    assert_eq!(outcome.errors.len(), 2);
    let t1 = outcome.errors.iter().find(|e| e.test_path.ends_with("t1.js")).unwrap();
    assert_eq!(t1.error_kind, "SandboxError");
    let t2 = outcome.errors.iter().find(|e| e.test_path.ends_with("t2.js")).unwrap();
    assert_eq!(t2.error_kind, "BailCancel");
    assert!(!outcome.errors.iter().any(|e| e.test_path.ends_with("t3.js")));
}

#[tokio::test]
async fn fatal_transport_error_aborts_the_run_even_without_bail() {
    let transport = Transport::new_root();
    let factory = ScriptedFactory::new(
        transport,
        Arc::new(|path, _attempt| {
            if path.ends_with("t1.js") {
                Attempt::FatalTransport
            } else {
                Attempt::SuccessAfter(Duration::from_millis(200))
            }
        }),
    );
    let config = ControllerConfig {
        worker_limit: WorkerLimit::Count(2),
        retry_count: 3,
        bail: false,
        ..Default::default()
    };
    let controller = controller(factory, config);

    let outcome = controller
        .run_queue(vec![entry("t1.js"), entry("t2.js"), entry("t3.js")])
        .await;

    let t1 = outcome.errors.iter().find(|e| e.test_path.ends_with("t1.js")).unwrap();
    assert_eq!(t1.error_kind, "TransportError");
    assert_eq!(outcome.stats.retried, 0, "fatal infrastructure errors must not be retried");
    assert!(!outcome.errors.iter().any(|e| e.test_path.ends_with("t3.js")));
}

#[tokio::test]
async fn worker_crash_replaces_and_continues() {
    let transport = Transport::new_root();
    let factory = ScriptedFactory::new(
        transport,
        Arc::new(|path, _attempt| {
            if path.ends_with("t1.js") {
                Attempt::Crash
            } else {
                Attempt::Success
            }
        }),
    );
    let config = ControllerConfig {
        worker_limit: WorkerLimit::Count(1),
        ..Default::default()
    };
    let controller = controller(factory, config);

    let outcome = controller.run_queue(vec![entry("t1.js"), entry("t2.js")]).await;

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].error_kind, "PeerLost");
    assert_eq!(outcome.stats.passed, 1);
    assert_eq!(outcome.stats.failed, 1);
}

#[tokio::test]
async fn worker_limit_zero_dispatches_nothing() {
    let transport = Transport::new_root();
    let factory = ScriptedFactory::new(transport, Arc::new(|_p, _a| Attempt::Success));
    let config = ControllerConfig {
        worker_limit: WorkerLimit::Count(0),
        ..Default::default()
    };
    let controller = controller(factory, config);

    let outcome = controller.run_queue(vec![entry("t1.js")]).await;
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.stats.passed, 0);
}

#[tokio::test]
async fn empty_entries_fires_before_and_after_run_with_empty_lists() {
    let transport = Transport::new_root();
    let factory = ScriptedFactory::new(transport, Arc::new(|_p, _a| Attempt::Success));
    let config = ControllerConfig {
        worker_limit: WorkerLimit::Count(1),
        ..Default::default()
    };
    let controller = controller(factory, config);

    let seen_before = Arc::new(StdMutex::new(None));
    let seen_before2 = seen_before.clone();
    controller
        .hooks()
        .before_run
        .register_read(hooks::BEFORE_RUN, "capture", move |v, _ctx| {
            let seen_before = seen_before2.clone();
            async move {
                *seen_before.lock().unwrap() = Some(v.len());
            }
        })
        .await
        .unwrap();
    let seen_after = Arc::new(StdMutex::new(None));
    let seen_after2 = seen_after.clone();
    controller
        .hooks()
        .after_run
        .register_read(hooks::AFTER_RUN, "capture", move |v, _ctx| {
            let seen_after = seen_after2.clone();
            async move {
                *seen_after.lock().unwrap() = Some(v.len());
            }
        })
        .await
        .unwrap();

    let outcome = controller.run_queue(Vec::new()).await;

    assert!(outcome.errors.is_empty());
    assert_eq!(*seen_before.lock().unwrap(), Some(0));
    assert_eq!(*seen_after.lock().unwrap(), Some(0));
}
