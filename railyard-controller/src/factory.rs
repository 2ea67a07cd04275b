//! Produces a fresh [`Worker`] on demand (spec §4.H "workers are created
//! lazily"). Two backends ship here, mirroring the two worker variants in
//! `railyard-worker`; a host embedding the controller may supply any
//! other implementation (a test double, say) since the controller only
//! ever depends on the trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use railyard_core::{Clock, Compiler, Logger, RailyardError};
use railyard_supervisor::Supervisor;
use railyard_transport::Transport;
use railyard_worker::{LocalWorker, RemoteWorker, Worker};

#[async_trait]
pub trait WorkerFactory: Send + Sync {
    async fn spawn_worker(&self) -> Result<Arc<dyn Worker>, RailyardError>;
}

/// Spawns an in-process [`LocalWorker`] per call (spec §4.G "Local mode").
pub struct LocalWorkerFactory {
    pub compiler: Arc<dyn Compiler>,
    pub clock: Arc<dyn Clock>,
    pub logger: Box<dyn Logger>,
    pub test_timeout: Duration,
}

#[async_trait]
impl WorkerFactory for LocalWorkerFactory {
    async fn spawn_worker(&self) -> Result<Arc<dyn Worker>, RailyardError> {
        let logger = self.logger.with_prefix("worker");
        Ok(Arc::new(LocalWorker::spawn(
            self.compiler.clone(),
            self.clock.clone(),
            logger,
            self.test_timeout,
        )))
    }
}

/// Spawns a supervised child process per call and wires it into the
/// shared [`Transport`] as a [`RemoteWorker`] (spec §4.G steps 1-4).
pub struct RemoteWorkerFactory {
    pub supervisor: Arc<Supervisor>,
    pub transport: Transport,
    pub command: String,
    pub args: Vec<String>,
}

#[async_trait]
impl WorkerFactory for RemoteWorkerFactory {
    async fn spawn_worker(&self) -> Result<Arc<dyn Worker>, RailyardError> {
        let worker = RemoteWorker::spawn(&self.supervisor, self.transport.clone(), &self.command, &self.args).await?;
        Ok(Arc::new(worker))
    }
}
