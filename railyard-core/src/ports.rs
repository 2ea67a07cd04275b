//! External ports (spec §4.J): the seams railyard leaves for the host
//! application to fill in. None of these are implemented here — concrete
//! backends (a real compiler, a real browser driver, a tracing-backed
//! logger) live in their own crates or in the host binary.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::RailyardError;

/// Turns test source into something the sandbox can evaluate. The
/// concrete backend (babel, swc, esbuild, ...) is entirely out of scope;
/// railyard only ever calls through this trait.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, source: &[u8], filename: &str) -> Result<Vec<u8>, RailyardError>;
}

/// Opaque, named-method remote procedure call into a running browser
/// session. `method` and `args` are forwarded verbatim; railyard never
/// interprets them, it only brokers applicant access (spec §4.I).
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn start_session(&self, session_id: &str) -> Result<(), RailyardError>;

    async fn call(
        &self,
        session_id: &str,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, RailyardError>;

    /// Cooperative session teardown, given a best-effort time budget
    /// before the caller escalates to a forced kill.
    async fn end(&self, session_id: &str, budget: Duration) -> Result<(), RailyardError>;

    /// Forced teardown once the cooperative budget in `end` has expired.
    async fn kill(&self, session_id: &str) -> Result<(), RailyardError>;
}

/// Structured logging port. Implementations are expected to be cheap to
/// clone (an `Arc` wrapper around a tracing span or similar) since
/// `with_prefix` is used liberally to scope component-local loggers.
pub trait Logger: Send + Sync {
    fn with_prefix(&self, prefix: &str) -> Box<dyn Logger>;
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Time source, abstracted so the controller's retry-delay and timeout
/// logic can be driven deterministically under test (spec §3.4).
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
    async fn sleep(&self, duration: Duration);
}

/// Filesystem read port, kept narrow (read-only) since railyard never
/// needs to write to the host filesystem outside of FS-Store's own
/// managed directory.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, RailyardError>;
}
