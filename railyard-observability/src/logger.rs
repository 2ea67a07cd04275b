//! Concrete [`railyard_core::Logger`] implementations (spec §3.1).
//!
//! `TracingLogger` realizes `Logger::with_prefix` by pushing a dotted
//! "component" field through nested calls rather than opening a
//! `tracing::Span` per message — the prefix is structural data on each
//! event, not a scope to enter and exit, since `Logger` is a plain
//! `Send + Sync` trait object with no notion of "current" span.

use railyard_core::Logger;

#[derive(Clone, Default)]
pub struct TracingLogger {
    component: String,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Logger for TracingLogger {
    fn with_prefix(&self, prefix: &str) -> Box<dyn Logger> {
        let component = if self.component.is_empty() {
            prefix.to_string()
        } else {
            format!("{}.{}", self.component, prefix)
        };
        Box::new(TracingLogger { component })
    }

    fn debug(&self, message: &str) {
        tracing::debug!(component = %self.component, "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(component = %self.component, "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(component = %self.component, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(component = %self.component, "{message}");
    }
}

/// Discards everything (spec §3.4 test tooling: used wherever a unit test
/// needs a `Logger` but has no interest in its output).
#[derive(Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn with_prefix(&self, _prefix: &str) -> Box<dyn Logger> {
        Box::new(NullLogger)
    }

    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_builds_a_dotted_component_path() {
        let root = TracingLogger::new();
        let child = root.with_prefix("controller").with_prefix("queue");
        // No public accessor for the component path beyond re-deriving it
        // through another with_prefix call; the behavior under test is
        // that nesting never panics and keeps producing a usable Logger.
        child.info("draining queue");
    }

    #[test]
    fn null_logger_with_prefix_stays_null() {
        let logger = NullLogger.with_prefix("anything");
        logger.error("should be discarded");
    }
}
