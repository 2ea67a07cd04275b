//! Controller-side handle for a worker running in a child process (spec
//! §4.G steps 1-4). The child's stdin carries controller→worker
//! `Envelope`s (via `ChildSink`); its stdout carries worker→controller
//! `Envelope`s, read back through [`railyard_supervisor::SpawnOptions::inbound`]
//! and re-injected into `Transport` so local listeners (`peer.lost`,
//! custom extension messages) see them exactly as they would in-process.

use std::collections::HashMap;
use std::sync::Arc;

use railyard_core::{Parameters, RailyardError, TestFile};
use railyard_supervisor::{ChildHandle, SpawnOptions, Supervisor};
use railyard_transport::{Envelope, Transport};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::outcome::Outcome;

pub struct RemoteWorker {
    worker_id: String,
    transport: Transport,
    child: Arc<ChildHandle>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Outcome>>>>,
}

impl RemoteWorker {
    pub async fn spawn(
        supervisor: &Supervisor,
        transport: Transport,
        command: &str,
        args: &[String],
    ) -> Result<Self, RailyardError> {
        let worker_id = format!("worker-{}", uuid::Uuid::new_v4());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let child = supervisor
            .spawn(
                command,
                args,
                SpawnOptions {
                    inbound: Some(tx),
                    ..Default::default()
                },
            )
            .await?;

        transport.register_child(worker_id.clone(), child.clone()).await;

        let pending: Arc<Mutex<HashMap<String, oneshot::Sender<Outcome>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let transport_loop = transport.clone();
        let pending_loop = pending.clone();
        let worker_id_loop = worker_id.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if envelope.message_type == "worker.outcome" {
                    if let Some(request_id) = envelope.request_id.clone() {
                        if let Some(tx) = pending_loop.lock().await.remove(&request_id) {
                            let _ = tx.send(decode_outcome(&envelope));
                            continue;
                        }
                    }
                }
                transport_loop.inject_local(envelope).await;
            }
            transport_loop.peer_lost(&worker_id_loop).await;
        });

        Ok(Self {
            worker_id,
            transport,
            child,
            pending,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub async fn execute(
        &self,
        file: TestFile,
        parameters: Parameters,
        env_parameters: Parameters,
    ) -> Outcome {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        let payload = serde_json::json!({
            "requestId": request_id,
            "file": file,
            "parameters": parameters,
            "envParameters": env_parameters,
        });

        if let Err(err) = self
            .transport
            .send(&self.worker_id, "worker.execute", payload)
            .await
        {
            self.pending.lock().await.remove(&request_id);
            return Outcome::Failure(err);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::Failure(RailyardError::PeerLost {
                worker_id: self.worker_id.clone(),
            }),
        }
    }

    pub async fn kill(&self, signal: Option<i32>) -> Result<(), RailyardError> {
        self.child.kill(signal).await
    }
}

fn decode_outcome(envelope: &Envelope) -> Outcome {
    let payload = &envelope.payload;
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("worker error")
            .to_string();
        Outcome::Failure(RailyardError::SandboxError(message))
    } else {
        Outcome::Success(payload.get("value").cloned().unwrap_or(serde_json::Value::Null))
    }
}
