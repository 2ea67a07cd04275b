//! Test-run-controller (spec §4.H): owns the FIFO queue and the worker
//! pool, fires the controller-level hooks, and applies retry/bail policy.

pub mod config;
pub mod controller;
pub mod factory;
pub mod hooks;
pub mod outcome;
pub mod peer_lost;
pub mod pool;
#[cfg(test)]
mod tests;

pub use config::ControllerConfig;
pub use controller::Controller;
pub use factory::{LocalWorkerFactory, RemoteWorkerFactory, WorkerFactory};
pub use hooks::{ControllerHooks, Veto};
pub use outcome::{ExecutedTest, RunQueueOutcome, RunStats};
pub use pool::WorkerPool;
