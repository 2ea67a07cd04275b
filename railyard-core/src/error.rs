//! Error taxonomy shared across every railyard component.
//!
//! Each component-local crate defines its own narrow error enum for the
//! failures it can originate (e.g. `railyard_fsstore::FsStoreError`) and
//! converts into [`RailyardError`] at the boundary where the error is
//! funneled to the Controller, per the propagation policy in the core
//! specification. This mirrors the teacher's practice of a single
//! `AppError` enum with `Display`/`From` impls rather than ad hoc error
//! strings scattered through the call stack.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of failure a test run can surface, independent of which
/// component originated it. This is the taxonomy, not a type per kind:
/// every variant here can carry enough context to build a controller
/// error-list entry.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum RailyardError {
    /// Source couldn't be compiled. Never retried by default.
    #[error("compile error: {0}")]
    CompileError(String),

    /// The `ModuleGraph` could not be built or a required module was
    /// missing at sandbox time.
    #[error("dependency error: {0}")]
    DependencyError(String),

    /// User code threw, or returned a rejected future.
    #[error("sandbox error: {0}")]
    SandboxError(String),

    /// Execution exceeded the configured budget.
    #[error("timeout after {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    /// A message could not be delivered over Transport.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A child process died. Treated like `TransportError` but also
    /// triggers worker replacement in the controller.
    #[error("peer lost: {worker_id}")]
    PeerLost { worker_id: String },

    /// FS-Store request failures.
    #[error("fs-store error: {0}")]
    FsStoreError(#[from] FsStoreErrorKind),

    /// Browser-proxy request failures.
    #[error("browser error: {0}")]
    BrowserError(#[from] BrowserErrorKind),

    /// Emitted by the controller to mark tests whose workers were killed
    /// because of a bail decision.
    #[error("cancelled by bail")]
    BailCancel,
}

/// `FsStoreError` subtypes (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum FsStoreErrorKind {
    #[error("lock contention on {0}")]
    LockContention(String),
    #[error("no such file: {0}")]
    NoSuchFile(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("server not ready")]
    ServerNotReady,
}

/// `BrowserError` subtypes (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BrowserErrorKind {
    #[error("session gone: {0}")]
    SessionGone(String),
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("timeout")]
    Timeout,
    #[error("driver fatal: {0}")]
    DriverFatal(String),
}

impl RailyardError {
    /// Short machine-readable discriminant, used as `errorKind` in the
    /// controller's `errors[]` output (spec §4.H).
    pub fn kind(&self) -> &'static str {
        match self {
            RailyardError::CompileError(_) => "CompileError",
            RailyardError::DependencyError(_) => "DependencyError",
            RailyardError::SandboxError(_) => "SandboxError",
            RailyardError::Timeout { .. } => "Timeout",
            RailyardError::TransportError(_) => "TransportError",
            RailyardError::PeerLost { .. } => "PeerLost",
            RailyardError::FsStoreError(_) => "FsStoreError",
            RailyardError::BrowserError(_) => "BrowserError",
            RailyardError::BailCancel => "BailCancel",
        }
    }

    /// Fatal infrastructure errors abort the run regardless of `bail`
    /// (spec §7 propagation policy).
    pub fn is_fatal_infrastructure(&self) -> bool {
        matches!(
            self,
            RailyardError::BrowserError(BrowserErrorKind::DriverFatal(_))
                | RailyardError::TransportError(_)
        )
    }

    /// Whether retrying the originating test could plausibly change the
    /// outcome. `CompileError` is never retried by default (spec §7);
    /// the controller may still veto via `shouldNotRetry` regardless.
    pub fn is_retryable_by_default(&self) -> bool {
        !matches!(self, RailyardError::CompileError(_) | RailyardError::BailCancel)
    }
}

/// One entry of the controller's `errors[]` output (spec §4.H, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub test_path: String,
    pub retries_used: u32,
    pub error_kind: &'static str,
    pub message: String,
    /// Opaque payload: stack trace, screenshot handle, etc.
    pub payload: Option<serde_json::Value>,
}

impl RunError {
    pub fn new(test_path: impl Into<String>, retries_used: u32, error: &RailyardError) -> Self {
        Self {
            test_path: test_path.into(),
            retries_used,
            error_kind: error.kind(),
            message: error.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, retries_used={}): {}",
            self.test_path, self.error_kind, self.retries_used, self.message
        )
    }
}
