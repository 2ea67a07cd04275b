//! Test-worker (spec §4.G): executes one `TestEntry` at a time, either
//! in-process ([`LocalWorker`]) or in a supervised child process
//! ([`RemoteWorker`] + [`run_worker_process`]) under an identical
//! contract.

pub mod compile;
pub mod local;
pub mod outcome;
pub mod process;
pub mod remote;
pub mod worker;

pub use compile::CompileUnit;
pub use local::LocalWorker;
pub use outcome::Outcome;
pub use process::run_worker_process;
pub use remote::RemoteWorker;
pub use worker::Worker;
