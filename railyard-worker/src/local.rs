//! In-process worker variant (spec §4.G "Local mode": "an alternative
//! worker implementation runs in the controller process without a
//! Transport hop for debugging; the contract is identical").

use std::sync::Arc;
use std::time::Duration;

use railyard_core::{Clock, Compiler, Hook, Logger, Parameters, RailyardError, TestFile, WorkerState};
use railyard_sandbox::Sandbox;
use tokio::sync::RwLock;

use crate::compile::{new_compile_hooks, CompileUnit, BEFORE_COMPILE, COMPILE};
use crate::outcome::Outcome;

pub struct LocalWorker {
    worker_id: String,
    compiler: Arc<dyn Compiler>,
    clock: Arc<dyn Clock>,
    logger: Box<dyn Logger>,
    compile_hooks: Hook<CompileUnit>,
    test_timeout: Duration,
    state: RwLock<WorkerState>,
}

impl LocalWorker {
    pub fn spawn(
        compiler: Arc<dyn Compiler>,
        clock: Arc<dyn Clock>,
        logger: Box<dyn Logger>,
        test_timeout: Duration,
    ) -> Self {
        let worker_id = format!("local-{}", uuid::Uuid::new_v4());
        logger.info(&format!("worker {worker_id} ready"));
        Self {
            worker_id,
            compiler,
            clock,
            logger,
            compile_hooks: new_compile_hooks(),
            test_timeout,
            state: RwLock::new(WorkerState::Idle),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Exposes the compile pipeline's hook chains so an embedding
    /// application can register `beforeCompile`/`compile` callbacks
    /// (spec §4.A: every extension point is plugin-visible).
    pub fn compile_hooks(&self) -> &Hook<CompileUnit> {
        &self.compile_hooks
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub async fn execute(
        &self,
        file: TestFile,
        parameters: Parameters,
        env_parameters: Parameters,
    ) -> Outcome {
        *self.state.write().await = WorkerState::Busy;
        let outcome = self.run(file, parameters, env_parameters).await;
        *self.state.write().await = WorkerState::Idle;
        outcome
    }

    async fn run(
        &self,
        file: TestFile,
        parameters: Parameters,
        env_parameters: Parameters,
    ) -> Outcome {
        let filename = file.path.display().to_string();
        let unit = CompileUnit {
            source: file.content,
            filename: filename.clone(),
        };
        let unit = match self.compile_hooks.call(BEFORE_COMPILE, unit).await {
            Ok(unit) => unit,
            Err(err) => return Outcome::Failure(RailyardError::CompileError(err.to_string())),
        };

        let compiled = match self.compiler.compile(&unit.source, &unit.filename).await {
            Ok(bytes) => bytes,
            Err(err) => return Outcome::Failure(err),
        };

        let unit = CompileUnit {
            source: compiled,
            filename: unit.filename,
        };
        let unit = match self.compile_hooks.call(COMPILE, unit).await {
            Ok(unit) => unit,
            Err(err) => return Outcome::Failure(RailyardError::CompileError(err.to_string())),
        };

        let graph = file.dependencies;
        let entry_path = unit.filename;
        let source = unit.source;
        let args = serde_json::json!({
            "parameters": parameters,
            "envParameters": env_parameters,
        });

        let run = tokio::task::spawn_blocking(move || {
            let mut sandbox = Sandbox::new(graph);
            sandbox.load(&entry_path, &source)?;
            sandbox.run_default_export(&entry_path, args)
        });

        tokio::select! {
            joined = run => match joined {
                Ok(Ok(value)) => Outcome::Success(value),
                Ok(Err(err)) => Outcome::Failure(err),
                Err(_panic) => Outcome::Failure(RailyardError::SandboxError(
                    "worker thread panicked while running the sandbox".to_string(),
                )),
            },
            _ = self.clock.sleep(self.test_timeout) => {
                self.logger.warn(&format!("{filename} exceeded its test timeout"));
                Outcome::Failure(RailyardError::Timeout {
                    budget_ms: self.test_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// No child process to signal in local mode; marks the worker dead
    /// so the pool won't dispatch further work to it.
    pub async fn kill(&self, _signal: Option<i32>) -> Result<(), RailyardError> {
        *self.state.write().await = WorkerState::Dead;
        Ok(())
    }
}
