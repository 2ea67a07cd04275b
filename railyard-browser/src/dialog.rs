//! Dialog auto-handling policy (spec §4.I, §9 open question: preserved
//! verbatim as the default even though the original intent is unclear).
//! The first dialog queued for an applicant is accepted; every dialog
//! queued after it, until the queue is drained by a fresh request batch,
//! is dismissed.

#[derive(Debug, Clone)]
pub struct DialogEvent {
    pub dialog_id: String,
    pub message: String,
}
