//! Scenario 6 (spec §8, per-applicant browser command ordering) plus the
//! `kill()` lifecycle and worker-disconnect release path.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use railyard_core::{BrowserDriver, Clock, RailyardError};
use railyard_transport::Transport;
use tokio::sync::Mutex;

use crate::broker::BrowserBroker;

struct RealtimeClock;

#[async_trait]
impl Clock for RealtimeClock {
    fn now_millis(&self) -> u64 {
        0
    }
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct ScriptedDriver {
    calls: Mutex<Vec<(String, String)>>,
    ended: Mutex<HashSet<String>>,
    killed: Mutex<HashSet<String>>,
    call_delay: Duration,
}

impl ScriptedDriver {
    fn new(call_delay: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            ended: Mutex::new(HashSet::new()),
            killed: Mutex::new(HashSet::new()),
            call_delay,
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn start_session(&self, _session_id: &str) -> Result<(), RailyardError> {
        Ok(())
    }

    async fn call(
        &self,
        session_id: &str,
        method: &str,
        _args: serde_json::Value,
    ) -> Result<serde_json::Value, RailyardError> {
        tokio::time::sleep(self.call_delay).await;
        self.calls.lock().await.push((session_id.to_string(), method.to_string()));
        Ok(serde_json::json!(true))
    }

    async fn end(&self, session_id: &str, _budget: Duration) -> Result<(), RailyardError> {
        self.ended.lock().await.insert(session_id.to_string());
        Ok(())
    }

    async fn kill(&self, session_id: &str) -> Result<(), RailyardError> {
        self.killed.lock().await.insert(session_id.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn per_applicant_commands_observe_program_order() {
    let transport = Transport::new_root();
    let driver = Arc::new(ScriptedDriver::new(Duration::from_millis(5)));
    let clock = Arc::new(RealtimeClock);
    let broker = BrowserBroker::new(driver.clone(), transport, clock, 4, Duration::from_millis(200)).await;

    // `join!` polls each sub-future in declaration order on every round, so
    // the click request is driven up to (and past) its queue push before
    // setValue's push is attempted, matching "sends click then immediately
    // setValue" without an artificial ordering hook.
    let (click_result, set_value_result) = tokio::join!(
        broker.request("A1", "worker-1", "click", serde_json::json!({ "sel": "selX" })),
        broker.request("A1", "worker-1", "setValue", serde_json::json!({ "sel": "selY", "v": "v" })),
    );
    assert!(click_result.is_ok());
    assert!(set_value_result.is_ok());

    // A second applicant's commands may freely interleave.
    broker
        .request("A2", "worker-2", "click", serde_json::json!({ "sel": "selZ" }))
        .await
        .unwrap();

    let calls = driver.calls.lock().await;
    let a1_calls: Vec<&str> = calls
        .iter()
        .filter(|(applicant, _)| applicant == "A1")
        .map(|(_, method)| method.as_str())
        .collect();
    assert_eq!(a1_calls, vec!["click", "setValue"]);
}

#[tokio::test]
async fn kill_ends_every_session_and_fires_release_hook() {
    let transport = Transport::new_root();
    let driver = Arc::new(ScriptedDriver::new(Duration::from_millis(1)));
    let clock = Arc::new(RealtimeClock);
    let broker = BrowserBroker::new(driver.clone(), transport, clock, 4, Duration::from_millis(50)).await;

    broker.request("A1", "worker-1", "click", serde_json::json!({})).await.unwrap();
    broker.request("A2", "worker-2", "click", serde_json::json!({})).await.unwrap();

    let released = Arc::new(Mutex::new(Vec::new()));
    let released2 = released.clone();
    broker
        .hooks()
        .register_read("ON_RELEASE", "capture", move |v, _ctx| {
            let released = released2.clone();
            async move {
                if let Some(id) = v.get("applicantId").and_then(|x| x.as_str()) {
                    released.lock().await.push(id.to_string());
                }
            }
        })
        .await
        .unwrap();

    broker.kill().await;

    let ended = driver.ended.lock().await;
    assert!(ended.contains("A1"));
    assert!(ended.contains("A2"));

    let released: HashSet<String> = released.lock().await.iter().cloned().collect();
    assert_eq!(released, HashSet::from(["A1".to_string(), "A2".to_string()]));
}

#[tokio::test]
async fn worker_disconnect_ends_owned_sessions() {
    let transport = Transport::new_root();
    let driver = Arc::new(ScriptedDriver::new(Duration::from_millis(1)));
    let clock = Arc::new(RealtimeClock);
    let broker = BrowserBroker::new(driver.clone(), transport.clone(), clock, 4, Duration::from_millis(50)).await;

    broker.request("A1", "worker-1", "click", serde_json::json!({})).await.unwrap();
    broker.request("A2", "worker-1", "click", serde_json::json!({})).await.unwrap();
    broker.request("A3", "worker-2", "click", serde_json::json!({})).await.unwrap();

    transport.peer_lost("worker-1").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let ended = driver.ended.lock().await;
    assert!(ended.contains("A1"));
    assert!(ended.contains("A2"));
    assert!(!ended.contains("A3"));
}
