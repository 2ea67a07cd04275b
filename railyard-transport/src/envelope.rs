use serde::{Deserialize, Serialize};

/// Wire format of every message that crosses a process boundary (spec §6).
/// Within a single process the same shape is used for uniformity, but the
/// payload is passed by `Arc` reference rather than re-serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub source_id: Option<String>,
    pub dest_id: Option<String>,
    pub request_id: Option<String>,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(message_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_type: message_type.into(),
            source_id: None,
            dest_id: None,
            request_id: None,
            payload,
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_dest(mut self, dest_id: impl Into<String>) -> Self {
        self.dest_id = Some(dest_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
