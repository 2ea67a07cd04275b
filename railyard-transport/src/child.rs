use async_trait::async_trait;
use railyard_core::RailyardError;

use crate::envelope::Envelope;

/// Whatever can receive a routed [`Envelope`] on behalf of a registered
/// child. Kept as a trait (rather than depending on `railyard-supervisor`
/// directly) so the supervisor crate can implement it for its own
/// `ChildHandle` without Transport depending back on it.
#[async_trait]
pub trait ChildSink: Send + Sync {
    async fn deliver(&self, envelope: Envelope) -> Result<(), RailyardError>;
}
