use railyard_core::RailyardError;

/// Result of one `execute()` call (spec §4.G step 3): the test's default
/// export either settled successfully, threw/rejected, or timed out.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(serde_json::Value),
    Failure(RailyardError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
