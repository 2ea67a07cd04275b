//! Captures emitted lines for assertions (spec §3.4), mirroring
//! `railyard_observability::TracingLogger`'s `with_prefix` chaining but
//! recording into a shared buffer instead of a tracing subscriber.

use std::sync::{Arc, Mutex};

use railyard_core::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub component: String,
    pub level: Level,
    pub message: String,
}

#[derive(Clone, Default)]
pub struct RecordingLogger {
    component: String,
    lines: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<Recorded> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|line| line.level == level && line.message.contains(needle))
    }

    fn record(&self, level: Level, message: &str) {
        self.lines.lock().unwrap().push(Recorded {
            component: self.component.clone(),
            level,
            message: message.to_string(),
        });
    }
}

impl Logger for RecordingLogger {
    fn with_prefix(&self, prefix: &str) -> Box<dyn Logger> {
        let component = if self.component.is_empty() {
            prefix.to_string()
        } else {
            format!("{}.{}", self.component, prefix)
        };
        Box::new(RecordingLogger {
            component,
            lines: self.lines.clone(),
        })
    }

    fn debug(&self, message: &str) {
        self.record(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }
}
