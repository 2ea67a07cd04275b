//! Standalone binary used by `tests/remote_round_trip.rs` to stand in for
//! a real host-supplied worker process (spec §4.G steps 1 & 4): just
//! enough `Compiler`/`Clock`/`Logger` to drive [`railyard_worker::process::run_worker_process`]
//! over real stdin/stdout pipes instead of the in-process `LocalWorker`
//! path every other test exercises.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use railyard_core::{Clock, Compiler, Logger, RailyardError};
use railyard_worker::process::run_worker_process;

struct PassthroughCompiler;

#[async_trait]
impl Compiler for PassthroughCompiler {
    async fn compile(&self, source: &[u8], _filename: &str) -> Result<Vec<u8>, RailyardError> {
        Ok(source.to_vec())
    }
}

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

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    run_worker_process(
        Arc::new(PassthroughCompiler),
        Arc::new(RealtimeClock),
        Box::new(NullLogger),
        Duration::from_secs(5),
    )
    .await
}
