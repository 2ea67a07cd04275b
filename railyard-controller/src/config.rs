//! Controller-local configuration. The umbrella crate's `RetryConfig`/
//! `PoolConfig` are mapped into this at wiring time; this stays a plain
//! struct here so the controller is independently constructible and
//! testable without depending on the umbrella crate's config surface.

use std::time::Duration;

use railyard_core::WorkerLimit;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub worker_limit: WorkerLimit,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub bail: bool,
    /// Kill and respawn the worker after every test, win or lose. Default
    /// is to reuse (spec §4.H "default is to reuse").
    pub restart_worker: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            worker_limit: WorkerLimit::Count(1),
            retry_count: 0,
            retry_delay: Duration::from_millis(0),
            bail: false,
            restart_worker: false,
        }
    }
}
