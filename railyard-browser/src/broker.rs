//! Browser-proxy controller (spec §4.I): a single broker that accepts
//! `request(applicantId, method, args)` messages from workers over
//! Transport and forwards them, one applicant at a time, to a
//! `BrowserDriver`.
//!
//! Grounded on `railyard-fsstore::server::FsStoreServer`'s per-key
//! `DashMap` + FIFO-drain shape: there a `PathRecord` serializes
//! Lock/Access/Unlink against one path, here a `BrowserSession`
//! serializes driver calls against one applicant. The global `threadCount`
//! ceiling is the same `tokio::sync::Semaphore` pattern for the same
//! reason: bound outstanding driver calls across every session, not just
//! within one.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use railyard_core::{BrowserDriver, BrowserErrorKind, Clock, Hook, RailyardError};
use railyard_transport::{Envelope, Subscription, Transport};
use tokio::sync::{oneshot, Mutex, Semaphore};
use tracing::warn;

use crate::dialog::DialogEvent;
use crate::session::{BrowserSession, QueuedRequest};

const ON_RELEASE: &str = "ON_RELEASE";
const DEFAULT_THREAD_COUNT: usize = 10;

pub struct BrowserBroker {
    driver: Arc<dyn BrowserDriver>,
    transport: Transport,
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, Arc<BrowserSession>>,
    owners: DashMap<String, Vec<String>>,
    creation_lock: Mutex<()>,
    ceiling: Arc<Semaphore>,
    session_close: Duration,
    hooks: Hook<serde_json::Value>,
    _request_sub: Subscription,
    _dialog_sub: Subscription,
    _peer_lost_sub: Subscription,
}

impl BrowserBroker {
    pub async fn new(
        driver: Arc<dyn BrowserDriver>,
        transport: Transport,
        clock: Arc<dyn Clock>,
        thread_count: usize,
        session_close: Duration,
    ) -> Arc<Self> {
        let (request_tx, mut request_rx) = tokio::sync::mpsc::unbounded_channel();
        let request_sub = transport
            .on("browser.request", move |envelope| {
                let request_tx = request_tx.clone();
                async move {
                    let _ = request_tx.send(envelope);
                }
            })
            .await;

        let (dialog_tx, mut dialog_rx) = tokio::sync::mpsc::unbounded_channel();
        let dialog_sub = transport
            .on("browser.dialog", move |envelope| {
                let dialog_tx = dialog_tx.clone();
                async move {
                    let _ = dialog_tx.send(envelope);
                }
            })
            .await;

        let (lost_tx, mut lost_rx) = tokio::sync::mpsc::unbounded_channel();
        let peer_lost_sub = transport
            .on("peer.lost", move |envelope| {
                let lost_tx = lost_tx.clone();
                async move {
                    let _ = lost_tx.send(envelope);
                }
            })
            .await;

        let broker = Arc::new(Self {
            driver,
            transport,
            clock,
            sessions: DashMap::new(),
            owners: DashMap::new(),
            creation_lock: Mutex::new(()),
            ceiling: Arc::new(Semaphore::new(thread_count.max(1))),
            session_close,
            hooks: Hook::new([ON_RELEASE]),
            _request_sub: request_sub,
            _dialog_sub: dialog_sub,
            _peer_lost_sub: peer_lost_sub,
        });

        let b1 = broker.clone();
        tokio::spawn(async move {
            while let Some(envelope) = request_rx.recv().await {
                let broker = b1.clone();
                tokio::spawn(async move { broker.handle_request_envelope(envelope).await });
            }
        });
        let b2 = broker.clone();
        tokio::spawn(async move {
            while let Some(envelope) = dialog_rx.recv().await {
                b2.handle_dialog_envelope(envelope).await;
            }
        });
        let b3 = broker.clone();
        tokio::spawn(async move {
            while let Some(envelope) = lost_rx.recv().await {
                if let Some(worker_id) = envelope.payload.get("workerId").and_then(|v| v.as_str()) {
                    b3.release_worker(worker_id).await;
                }
            }
        });

        broker
    }

    pub async fn with_defaults(driver: Arc<dyn BrowserDriver>, transport: Transport, clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::new(driver, transport, clock, DEFAULT_THREAD_COUNT, Duration::from_secs(5)).await
    }

    pub fn hooks(&self) -> &Hook<serde_json::Value> {
        &self.hooks
    }

    async fn handle_request_envelope(self: Arc<Self>, envelope: Envelope) {
        let Some(applicant_id) = envelope.payload.get("applicantId").and_then(|v| v.as_str()) else {
            return;
        };
        let Some(method) = envelope.payload.get("method").and_then(|v| v.as_str()) else {
            return;
        };
        let args = envelope.payload.get("args").cloned().unwrap_or(serde_json::Value::Null);
        let Some(worker_id) = envelope.source_id.clone() else {
            return;
        };
        let request_id = envelope.request_id.clone().unwrap_or_default();

        let result = self.request(applicant_id, &worker_id, method, args).await;
        let payload = match result {
            Ok(value) => serde_json::json!({ "requestId": request_id, "value": value }),
            Err(err) => serde_json::json!({
                "requestId": request_id,
                "error": { "kind": err.kind(), "message": err.to_string() },
            }),
        };
        if let Err(err) = self.transport.send(&worker_id, "browser.response", payload).await {
            warn!(error = %err, worker_id = %worker_id, "failed to deliver browser.response");
        }
    }

    async fn handle_dialog_envelope(&self, envelope: Envelope) {
        let Some(applicant_id) = envelope.payload.get("applicantId").and_then(|v| v.as_str()) else {
            return;
        };
        let Some(dialog_id) = envelope.payload.get("dialogId").and_then(|v| v.as_str()) else {
            return;
        };
        let message = envelope
            .payload
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let Some(session) = self.sessions.get(applicant_id).map(|e| e.clone()) else {
            return;
        };

        let queue_len = {
            let mut dialogs = session.dialogs.lock().await;
            dialogs.push(DialogEvent {
                dialog_id: dialog_id.to_string(),
                message,
            });
            dialogs.len()
        };

        let method = if queue_len == 1 { "acceptDialog" } else { "dismissDialog" };
        let _ = self
            .driver
            .call(applicant_id, method, serde_json::json!({ "dialogId": dialog_id }))
            .await;
    }

    /// Forward one command for `applicant_id`, creating its session on
    /// first use. Commands for the same applicant are queued and drained
    /// one at a time (spec §8 scenario 6); commands for different
    /// applicants may run concurrently up to the `threadCount` ceiling.
    pub async fn request(
        self: &Arc<Self>,
        applicant_id: &str,
        worker_id: &str,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, RailyardError> {
        let session = self.session_for(applicant_id, worker_id).await?;

        let (tx, rx) = oneshot::channel();
        {
            let mut queue = session.queue.lock().await;
            queue.push_back(QueuedRequest {
                method: method.to_string(),
                args,
                responder: tx,
            });
        }
        self.ensure_draining(session);

        rx.await.unwrap_or_else(|_| {
            Err(RailyardError::BrowserError(BrowserErrorKind::SessionGone(
                applicant_id.to_string(),
            )))
        })
    }

    async fn session_for(
        self: &Arc<Self>,
        applicant_id: &str,
        worker_id: &str,
    ) -> Result<Arc<BrowserSession>, RailyardError> {
        if let Some(existing) = self.sessions.get(applicant_id) {
            return Ok(existing.clone());
        }

        let _guard = self.creation_lock.lock().await;
        if let Some(existing) = self.sessions.get(applicant_id) {
            return Ok(existing.clone());
        }

        self.driver.start_session(applicant_id).await?;
        let session = Arc::new(BrowserSession::new(applicant_id, worker_id));
        self.sessions.insert(applicant_id.to_string(), session.clone());
        self.owners
            .entry(worker_id.to_string())
            .or_default()
            .push(applicant_id.to_string());
        Ok(session)
    }

    fn ensure_draining(self: &Arc<Self>, session: Arc<BrowserSession>) {
        if session
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let broker = self.clone();
            tokio::spawn(async move { broker.drain(session).await });
        }
    }

    async fn drain(self: Arc<Self>, session: Arc<BrowserSession>) {
        loop {
            let next = {
                let mut queue = session.queue.lock().await;
                queue.pop_front()
            };
            let Some(request) = next else {
                session.draining.store(false, Ordering::SeqCst);
                let still_empty = session.queue.lock().await.is_empty();
                if still_empty {
                    return;
                }
                if session
                    .draining
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return;
                }
                continue;
            };

            let permit = self
                .ceiling
                .clone()
                .acquire_owned()
                .await
                .expect("ceiling semaphore is never closed");
            let result = self.driver.call(&session.applicant_id, &request.method, request.args).await;
            drop(permit);
            let _ = request.responder.send(result);
        }
    }

    /// Worker disconnect (spec §4.I): end every applicant it held,
    /// cooperatively, with no forced kill and no `ON_RELEASE` (that hook
    /// is reserved for the broker-wide `kill()` lifecycle).
    async fn release_worker(&self, worker_id: &str) {
        let Some((_, applicants)) = self.owners.remove(worker_id) else {
            return;
        };
        for applicant_id in applicants {
            self.sessions.remove(&applicant_id);
            if let Err(err) = self.driver.end(&applicant_id, self.session_close).await {
                warn!(error = %err, applicant_id = %applicant_id, "end() on worker disconnect failed");
            }
        }
    }

    /// Broker-wide shutdown (spec §4.I): cooperative `end` for every
    /// session, racing a `sessionClose` budget, then a forced `kill` for
    /// any session that didn't finish in time; `ON_RELEASE` fires once
    /// per session regardless of which path it took.
    pub async fn kill(&self) {
        let sessions: Vec<(String, Arc<BrowserSession>)> =
            self.sessions.iter().map(|e| (e.key().clone(), e.value().clone())).collect();

        for (applicant_id, _session) in sessions {
            self.sessions.remove(&applicant_id);

            let budget = self.session_close;
            let ended = tokio::select! {
                result = self.driver.end(&applicant_id, budget) => result.is_ok(),
                _ = self.clock.sleep(budget) => false,
            };
            if !ended {
                if let Err(err) = self.driver.kill(&applicant_id).await {
                    warn!(error = %err, applicant_id = %applicant_id, "forced browser session kill failed");
                }
            }

            let _ = self
                .hooks
                .call(ON_RELEASE, serde_json::json!({ "applicantId": applicant_id }))
                .await;
        }
        self.owners.clear();
    }
}
