//! FS-Store server algorithm (spec §4.F).
//!
//! Grounded on the teacher's `DashMap`-backed `InMemoryStore`
//! (`r2e-cache`): per-key state lives behind a `DashMap`, but each entry
//! here is a small state machine (`Free -> Locked -> Free`,
//! `Free -> Accessed -> Free`, `Free/Accessed -> Unlinked`) with FIFO
//! queues rather than a bare TTL slot.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use railyard_core::{FileAction, FileMeta, FileRequest, FsStoreErrorKind, Hook, RailyardError, UniqPolicy};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_THREAD_COUNT: usize = 10;

struct Waiter {
    request_id: String,
    worker_id: String,
    grant: tokio::sync::oneshot::Sender<()>,
}

#[derive(Default)]
struct PathRecord {
    lock_holder: Option<(String, String)>,
    access_holders: HashSet<String>,
    unlinked: bool,
    lock_queue: VecDeque<Waiter>,
    access_queue: VecDeque<Waiter>,
    unlink_queue: VecDeque<Waiter>,
}

impl PathRecord {
    /// Drain each queue in priority order, granting whatever the current
    /// state allows (spec §4.F granting rules).
    fn drain(&mut self) {
        if self.lock_holder.is_none() && !self.unlinked {
            if let Some(w) = self.lock_queue.pop_front() {
                let holder = (w.request_id.clone(), w.worker_id.clone());
                self.lock_holder = Some(holder);
                let _ = w.grant.send(());
            }
        }
        if self.lock_holder.is_none() {
            while let Some(w) = self.access_queue.pop_front() {
                self.access_holders.insert(w.request_id.clone());
                let _ = w.grant.send(());
            }
        }
        if self.lock_holder.is_none() && self.access_holders.is_empty() && !self.unlinked {
            if let Some(w) = self.unlink_queue.pop_front() {
                self.unlinked = true;
                let _ = w.grant.send(());
            }
        }
    }

    fn release(&mut self, request_id: &str) {
        if self.lock_holder.as_ref().map(|(r, _)| r.as_str()) == Some(request_id) {
            self.lock_holder = None;
        }
        self.access_holders.remove(request_id);
        self.drain();
    }
}

/// A token returned from `acquire`; presenting it to `release` frees the
/// slot. `release` is idempotent (spec §8).
#[derive(Debug, Clone)]
pub struct ReleaseToken {
    pub request_id: String,
    pub full_path: String,
}

struct Grant {
    #[allow(dead_code)]
    permit: OwnedSemaphorePermit,
}

pub struct FsStoreServer {
    artifact_root: PathBuf,
    paths: DashMap<String, Arc<Mutex<PathRecord>>>,
    grants: DashMap<String, Grant>,
    worker_requests: DashMap<String, Vec<(String, String)>>, // worker_id -> [(request_id, full_path)]
    ceiling: Arc<Semaphore>,
    hooks: Hook<serde_json::Value>,
    ready: std::sync::atomic::AtomicBool,
}

impl FsStoreServer {
    pub fn new(artifact_root: PathBuf, thread_count: usize) -> Self {
        Self {
            artifact_root,
            paths: DashMap::new(),
            grants: DashMap::new(),
            worker_requests: DashMap::new(),
            ceiling: Arc::new(Semaphore::new(thread_count.max(1))),
            hooks: Hook::new(["ON_FILENAME", "ON_QUEUE", "ON_RELEASE"]),
            ready: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn with_defaults(artifact_root: PathBuf) -> Self {
        Self::new(artifact_root, DEFAULT_THREAD_COUNT)
    }

    pub fn hooks(&self) -> &Hook<serde_json::Value> {
        &self.hooks
    }

    /// Synthesize (or take verbatim) the full path for a request, applying
    /// the `ON_FILENAME` write hook last (spec §4.F filename generation,
    /// §6 artifact layout).
    async fn resolve_full_path(&self, request: &FileRequest) -> Result<String, RailyardError> {
        let meta: &FileMeta = &request.meta;
        let candidate = if let Some(name) = &meta.file_name {
            self.artifact_root.join(name).display().to_string()
        } else {
            let ext = meta.ext.clone().unwrap_or_default();
            let file_type = meta.file_type.clone().unwrap_or_else(|| "artifact".to_string());
            let dot_ext = if ext.is_empty() { String::new() } else { format!(".{ext}") };
            match meta.uniq_policy.unwrap_or(UniqPolicy::Global) {
                UniqPolicy::Global => self
                    .artifact_root
                    .join(format!(
                        "{}-{}-{file_type}{dot_ext}",
                        request.worker_id, request.request_id
                    ))
                    .display()
                    .to_string(),
                UniqPolicy::Worker => self
                    .artifact_root
                    .join(&request.worker_id)
                    .join(format!("{}-{file_type}{dot_ext}", request.request_id))
                    .display()
                    .to_string(),
            }
        };

        let resolved = match self.hooks.call("ON_FILENAME", serde_json::json!(candidate)).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "ON_FILENAME hook failed, falling back to synthesized name");
                serde_json::json!(candidate)
            }
        };
        Ok(resolved.as_str().unwrap_or(&candidate).to_string())
    }

    /// Request a slot. Resolves once the server grants the action, or
    /// immediately errors for `Unlinked`/not-ready paths.
    pub async fn acquire(&self, request: FileRequest) -> Result<ReleaseToken, RailyardError> {
        if !self.ready.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RailyardError::FsStoreError(FsStoreErrorKind::ServerNotReady));
        }

        let full_path = self.resolve_full_path(&request).await?;
        let record = self
            .paths
            .entry(full_path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PathRecord::default())))
            .clone();

        {
            let guard = record.lock().await;
            if guard.unlinked {
                return Err(RailyardError::FsStoreError(FsStoreErrorKind::NoSuchFile(
                    full_path,
                )));
            }
        }

        let permit = self
            .ceiling
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RailyardError::FsStoreError(FsStoreErrorKind::ServerNotReady))?;

        let (tx, rx) = tokio::sync::oneshot::channel();
        let waiter = Waiter {
            request_id: request.request_id.clone(),
            worker_id: request.worker_id.clone(),
            grant: tx,
        };

        {
            let mut guard = record.lock().await;
            match request.action {
                FileAction::Lock => guard.lock_queue.push_back(waiter),
                FileAction::Access => guard.access_queue.push_back(waiter),
                FileAction::Unlink => guard.unlink_queue.push_back(waiter),
            }
            guard.drain();
        }

        rx.await
            .map_err(|_| RailyardError::FsStoreError(FsStoreErrorKind::ServerNotReady))?;

        self.grants.insert(request.request_id.clone(), Grant { permit });
        self.worker_requests
            .entry(request.worker_id.clone())
            .or_default()
            .push((request.request_id.clone(), full_path.clone()));

        debug!(request_id = %request.request_id, full_path = %full_path, "fs-store grant");
        Ok(ReleaseToken {
            request_id: request.request_id,
            full_path,
        })
    }

    /// Idempotent release: a second release of the same token is a no-op.
    pub async fn release(&self, token: &ReleaseToken) {
        let Some(record) = self.paths.get(&token.full_path).map(|e| e.clone()) else {
            return;
        };
        {
            let mut guard = record.lock().await;
            guard.release(&token.request_id);
        }
        self.grants.remove(&token.request_id);
        self.hooks
            .call(
                "ON_RELEASE",
                serde_json::json!({ "requestId": token.request_id, "fullPath": token.full_path }),
            )
            .await
            .ok();
    }

    pub async fn wait_for_unlock(&self, full_path: &str) {
        loop {
            let Some(record) = self.paths.get(full_path).map(|e| e.clone()) else {
                return;
            };
            let locked = {
                let guard = record.lock().await;
                guard.lock_holder.is_some()
            };
            if !locked {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    /// Release every outstanding request belonging to a disconnected
    /// worker (spec §4.F release paths).
    pub async fn release_worker(&self, worker_id: &str) {
        let Some((_, requests)) = self.worker_requests.remove(worker_id) else {
            return;
        };
        for (request_id, full_path) in requests {
            if let Some(record) = self.paths.get(&full_path).map(|e| e.clone()) {
                let mut guard = record.lock().await;
                guard.release(&request_id);
            }
            self.grants.remove(&request_id);
            warn!(worker_id = %worker_id, request_id = %request_id, "released request on worker disconnect");
        }
    }
}

/// Generate a fresh request id, used by clients that don't supply one.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}
