//! Per-`applicantId` browser session state (spec §3 "Browser session",
//! §4.I). Each session owns a FIFO command queue so requests from the
//! same applicant are observed by the driver in program order even
//! though they arrive over an asynchronous bus.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;

use railyard_core::RailyardError;
use tokio::sync::{oneshot, Mutex};

use crate::dialog::DialogEvent;

pub struct QueuedRequest {
    pub method: String,
    pub args: serde_json::Value,
    pub responder: oneshot::Sender<Result<serde_json::Value, RailyardError>>,
}

pub struct BrowserSession {
    pub applicant_id: String,
    pub worker_id: String,
    pub queue: Mutex<VecDeque<QueuedRequest>>,
    pub draining: AtomicBool,
    pub dialogs: Mutex<Vec<DialogEvent>>,
}

impl BrowserSession {
    pub fn new(applicant_id: impl Into<String>, worker_id: impl Into<String>) -> Self {
        Self {
            applicant_id: applicant_id.into(),
            worker_id: worker_id.into(),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            dialogs: Mutex::new(Vec::new()),
        }
    }
}
