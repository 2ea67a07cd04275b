//! Common interface both worker backends satisfy (spec §4.G: "an
//! alternative worker implementation runs in the controller process
//! ... the contract is identical"). The controller dispatches against
//! this trait so it never needs to know whether a given worker is a
//! child process or an in-process sandbox.

use async_trait::async_trait;
use railyard_core::{Parameters, RailyardError, TestFile};

use crate::outcome::Outcome;

#[async_trait]
pub trait Worker: Send + Sync {
    fn worker_id(&self) -> &str;

    async fn execute(
        &self,
        file: TestFile,
        parameters: Parameters,
        env_parameters: Parameters,
    ) -> Outcome;

    async fn kill(&self, signal: Option<i32>) -> Result<(), RailyardError>;
}

#[async_trait]
impl Worker for crate::local::LocalWorker {
    fn worker_id(&self) -> &str {
        crate::local::LocalWorker::worker_id(self)
    }

    async fn execute(
        &self,
        file: TestFile,
        parameters: Parameters,
        env_parameters: Parameters,
    ) -> Outcome {
        crate::local::LocalWorker::execute(self, file, parameters, env_parameters).await
    }

    async fn kill(&self, signal: Option<i32>) -> Result<(), RailyardError> {
        crate::local::LocalWorker::kill(self, signal).await
    }
}

#[async_trait]
impl Worker for crate::remote::RemoteWorker {
    fn worker_id(&self) -> &str {
        crate::remote::RemoteWorker::worker_id(self)
    }

    async fn execute(
        &self,
        file: TestFile,
        parameters: Parameters,
        env_parameters: Parameters,
    ) -> Outcome {
        crate::remote::RemoteWorker::execute(self, file, parameters, env_parameters).await
    }

    async fn kill(&self, signal: Option<i32>) -> Result<(), RailyardError> {
        crate::remote::RemoteWorker::kill(self, signal).await
    }
}
