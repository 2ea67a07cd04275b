//! In-memory [`railyard_core::BrowserDriver`] stub (spec §3.4), grounded
//! on the `ScriptedDriver` test double in `railyard-browser`'s own test
//! module — lifted out so other crates' end-to-end tests can drive a
//! browser broker without a real session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use railyard_core::{BrowserDriver, BrowserErrorKind, RailyardError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub session_id: String,
    pub method: String,
}

#[derive(Default)]
pub struct ScriptedBrowserDriver {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    started: Vec<String>,
    ended: Vec<String>,
    killed: Vec<String>,
    responses: HashMap<String, serde_json::Value>,
    failing_methods: HashMap<String, String>,
}

impl ScriptedBrowserDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a fixed return value for every call to `method`.
    pub fn respond(&self, method: &str, value: serde_json::Value) {
        self.state.lock().unwrap().responses.insert(method.to_string(), value);
    }

    /// Make every call to `method` fail with `message`.
    pub fn fail(&self, method: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_methods
            .insert(method.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, session_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.session_id == session_id)
            .map(|call| call.method.clone())
            .collect()
    }

    pub fn was_started(&self, session_id: &str) -> bool {
        self.state.lock().unwrap().started.contains(&session_id.to_string())
    }

    pub fn was_ended(&self, session_id: &str) -> bool {
        self.state.lock().unwrap().ended.contains(&session_id.to_string())
    }

    pub fn was_killed(&self, session_id: &str) -> bool {
        self.state.lock().unwrap().killed.contains(&session_id.to_string())
    }
}

#[async_trait]
impl BrowserDriver for ScriptedBrowserDriver {
    async fn start_session(&self, session_id: &str) -> Result<(), RailyardError> {
        self.state.lock().unwrap().started.push(session_id.to_string());
        Ok(())
    }

    async fn call(
        &self,
        session_id: &str,
        method: &str,
        _args: serde_json::Value,
    ) -> Result<serde_json::Value, RailyardError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            session_id: session_id.to_string(),
            method: method.to_string(),
        });
        if let Some(message) = state.failing_methods.get(method).cloned() {
            return Err(RailyardError::BrowserError(BrowserErrorKind::DriverFatal(message)));
        }
        Ok(state.responses.get(method).cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn end(&self, session_id: &str, _budget: Duration) -> Result<(), RailyardError> {
        self.state.lock().unwrap().ended.push(session_id.to_string());
        Ok(())
    }

    async fn kill(&self, session_id: &str) -> Result<(), RailyardError> {
        self.state.lock().unwrap().killed.push(session_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_per_session() {
        let driver = ScriptedBrowserDriver::new();
        driver.start_session("a1").await.unwrap();
        driver.call("a1", "click", serde_json::json!({})).await.unwrap();
        driver.call("a1", "setValue", serde_json::json!({})).await.unwrap();

        assert!(driver.was_started("a1"));
        assert_eq!(driver.calls_for("a1"), vec!["click", "setValue"]);
    }

    #[tokio::test]
    async fn scripted_failure_surfaces_as_a_browser_error() {
        let driver = ScriptedBrowserDriver::new();
        driver.fail("click", "element not found");
        let err = driver.call("a1", "click", serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("element not found"));
    }
}
