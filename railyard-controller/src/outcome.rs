use railyard_core::{RunError, TestEntry};
use railyard_worker::Outcome;

/// Bundles one dispatch attempt for the `afterTest` hook.
#[derive(Debug, Clone)]
pub struct ExecutedTest {
    pub entry: TestEntry,
    pub outcome: Outcome,
}

/// Pass/fail/retry/bail counters, additive to the `errors[]` contract
/// (spec §4.H never mentions counts; this is the supplemental run summary).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunStats {
    pub passed: u32,
    pub failed: u32,
    pub retried: u32,
    pub bailed: u32,
}

/// Return value of [`crate::Controller::run_queue`].
#[derive(Debug, Clone, Default)]
pub struct RunQueueOutcome {
    pub errors: Vec<RunError>,
    pub stats: RunStats,
}
