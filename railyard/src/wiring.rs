//! Assembles every component crate into one running instance (spec §6,
//! ambient wiring). A host either embeds remote workers (a separate
//! compiled process per test, the spec's default) or local ones (the
//! `debug.local` escape hatch used by `railyard-test`-driven end-to-end
//! tests) — both share the same `Controller`, `FsStoreServer`, and
//! optional `BrowserBroker`.

use std::sync::Arc;

use railyard_browser::BrowserBroker;
use railyard_core::{BrowserDriver, Clock, Compiler, Logger};
use railyard_controller::{Controller, ControllerConfig, LocalWorkerFactory, RemoteWorkerFactory, RunQueueOutcome, WorkerFactory};
use railyard_fsstore::{FsStoreClient, FsStoreServer};
use railyard_supervisor::{ProcessRegistry, Supervisor};
use railyard_transport::Transport;

use crate::config::RailyardConfig;

/// How the controller spawns workers: in-process (cheap, used for
/// embedding tests) or as supervised child processes (spec §4.G default).
pub enum WorkerBackend {
    Local { compiler: Arc<dyn Compiler> },
    Remote { command: String, args: Vec<String> },
}

pub struct Railyard {
    controller: Controller,
    fs_store: Arc<FsStoreServer>,
    transport: Transport,
    browser: Option<Arc<BrowserBroker>>,
}

impl Railyard {
    /// Wire every component per `config`. `logger`/`clock` back the
    /// `Logger`/`Clock` ports throughout; `browser_driver` is optional
    /// since not every run needs the browser-proxy controller (spec §4.I
    /// is only engaged by tests that actually call into it).
    pub async fn new(
        config: RailyardConfig,
        backend: WorkerBackend,
        logger: Box<dyn Logger>,
        clock: Arc<dyn Clock>,
        browser_driver: Option<Arc<dyn BrowserDriver>>,
    ) -> Self {
        let transport = Transport::new_root();
        let fs_store = Arc::new(FsStoreServer::new(
            config.fs_store.artifact_root.clone(),
            config.fs_store.thread_count,
        ));

        let controller_config = ControllerConfig {
            worker_limit: config.pool.worker_limit.clone(),
            retry_count: config.retry.retry_count,
            retry_delay: config.retry.retry_delay,
            bail: config.retry.bail,
            restart_worker: config.pool.restart_worker,
        };

        let factory: Arc<dyn WorkerFactory> = match backend {
            WorkerBackend::Local { compiler } => Arc::new(LocalWorkerFactory {
                compiler,
                clock: clock.clone(),
                logger: logger.with_prefix("worker"),
                test_timeout: config.timeouts.test_timeout,
            }),
            WorkerBackend::Remote { command, args } => {
                let registry = Arc::new(ProcessRegistry::new(ProcessRegistry::default_path()));
                let supervisor = Arc::new(Supervisor::new(registry));
                Arc::new(RemoteWorkerFactory {
                    supervisor,
                    transport: transport.clone(),
                    command,
                    args,
                })
            }
        };

        let controller = Controller::new(controller_config, factory, clock.clone(), logger.with_prefix("controller"), transport.clone());

        let browser = match browser_driver {
            Some(driver) => Some(
                BrowserBroker::new(
                    driver,
                    transport.clone(),
                    clock.clone(),
                    config.fs_store.thread_count,
                    config.timeouts.session_close,
                )
                .await,
            ),
            None => None,
        };

        Self {
            controller,
            fs_store,
            transport,
            browser,
        }
    }

    /// `runQueue(entries) -> errors[]` (spec §6). The supplemental
    /// `RunStats` counters ride alongside the error list rather than
    /// replacing it.
    pub async fn run_queue(&self, entries: Vec<railyard_core::TestEntry>) -> RunQueueOutcome {
        self.controller.run_queue(entries).await
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn fs_store_client(&self, worker_id: impl Into<String>) -> FsStoreClient {
        FsStoreClient::new(self.fs_store.clone(), worker_id)
    }

    pub fn browser(&self) -> Option<&Arc<BrowserBroker>> {
        self.browser.as_ref()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Orderly shutdown: ends every live browser session before dropping
    /// the transport, per the `kill()` lifecycle in spec §4.I.
    pub async fn shutdown(&self) {
        if let Some(browser) = &self.browser {
            browser.kill().await;
        }
    }
}
