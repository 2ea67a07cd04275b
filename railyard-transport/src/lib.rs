//! Named message bus linking the controller process with each worker and
//! with auxiliary processes (browser-proxy, fs-store) — spec §4.B.
//!
//! Adapted from the teacher's `TypeId`-keyed `EventBus`/`LocalEventBus`
//! (`r2e-events`): dispatch here is keyed by a `String` message type
//! instead of a Rust type, since messages cross process boundaries as
//! `test.*`/`fs.*`/`browser.*`/`log.*` names over an opaque JSON payload
//! rather than as concrete in-process types.

pub mod child;
pub mod envelope;

pub use child::ChildSink;
pub use envelope::Envelope;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use railyard_core::RailyardError;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Callback = Arc<dyn Fn(Envelope) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct HandlerEntry {
    id: u64,
    source_filter: Option<String>,
    once: bool,
    callback: Callback,
}

struct ChildEntry {
    sink: Arc<dyn ChildSink>,
    cancel: CancellationToken,
}

/// A single Transport instance: either the root (controller-side) bus, or
/// a child-side handle a worker process uses to talk back to it. The two
/// differ only in `is_child`, mirroring spec §4.B's `isChild()`.
#[derive(Clone)]
pub struct Transport {
    handlers: Arc<RwLock<HashMap<String, Vec<HandlerEntry>>>>,
    children: Arc<RwLock<HashMap<String, ChildEntry>>>,
    next_id: Arc<AtomicU64>,
    is_child: bool,
}

/// A handle callers use to cancel a previously-registered listener.
/// Cancellation is explicit rather than tied to `Drop` since a handler may
/// legitimately need to outlive the scope that registered it.
pub struct Subscription {
    transport: Transport,
    message_type: String,
    id: u64,
}

impl Subscription {
    pub async fn cancel(self) {
        let mut handlers = self.transport.handlers.write().await;
        if let Some(list) = handlers.get_mut(&self.message_type) {
            list.retain(|h| h.id != self.id);
        }
    }
}

impl Transport {
    pub fn new_root() -> Self {
        Self::new(false)
    }

    pub fn new_child() -> Self {
        Self::new(true)
    }

    fn new(is_child: bool) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            children: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            is_child,
        }
    }

    pub fn is_child(&self) -> bool {
        self.is_child
    }

    async fn register(
        &self,
        message_type: impl Into<String>,
        source_filter: Option<String>,
        once: bool,
        callback: Callback,
    ) -> Subscription {
        let message_type = message_type.into();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut handlers = self.handlers.write().await;
        handlers
            .entry(message_type.clone())
            .or_default()
            .push(HandlerEntry {
                id,
                source_filter,
                once,
                callback,
            });
        Subscription {
            transport: self.clone(),
            message_type,
            id,
        }
    }

    pub async fn on<F, Fut>(&self, message_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(
            message_type,
            None,
            false,
            Arc::new(move |env| Box::pin(callback(env))),
        )
        .await
    }

    pub async fn once<F, Fut>(&self, message_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(
            message_type,
            None,
            true,
            Arc::new(move |env| Box::pin(callback(env))),
        )
        .await
    }

    pub async fn once_from<F, Fut>(
        &self,
        source_id: impl Into<String>,
        message_type: impl Into<String>,
        callback: F,
    ) -> Subscription
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(
            message_type,
            Some(source_id.into()),
            true,
            Arc::new(move |env| Box::pin(callback(env))),
        )
        .await
    }

    /// Dispatch to every matching local handler, spawning each as its own
    /// task so a slow handler cannot stall the bus (spec §4.B: "Handlers
    /// may not block the bus thread").
    async fn dispatch_local(&self, envelope: &Envelope) {
        let to_run: Vec<(u64, Callback)> = {
            let handlers = self.handlers.read().await;
            match handlers.get(&envelope.message_type) {
                Some(list) => list
                    .iter()
                    .filter(|h| match &h.source_filter {
                        Some(src) => envelope.source_id.as_deref() == Some(src.as_str()),
                        None => true,
                    })
                    .map(|h| (h.id, h.callback.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };

        if to_run.is_empty() {
            return;
        }

        let mut fired_once = Vec::new();
        for (id, callback) in &to_run {
            let env = envelope.clone();
            let callback = callback.clone();
            tokio::spawn(async move { callback(env).await });
            fired_once.push(*id);
        }

        let mut handlers = self.handlers.write().await;
        if let Some(list) = handlers.get_mut(&envelope.message_type) {
            list.retain(|h| !(h.once && fired_once.contains(&h.id)));
        }
    }

    pub async fn broadcast_local(&self, message_type: impl Into<String>, payload: serde_json::Value) {
        let envelope = Envelope::new(message_type, payload);
        self.dispatch_local(&envelope).await;
    }

    pub async fn broadcast(&self, message_type: impl Into<String>, payload: serde_json::Value) {
        let envelope = Envelope::new(message_type, payload);
        self.dispatch_local(&envelope).await;
        self.deliver_to_children(&envelope).await;
    }

    pub async fn broadcast_from(
        &self,
        message_type: impl Into<String>,
        payload: serde_json::Value,
        source_id: impl Into<String>,
    ) {
        let envelope = Envelope::new(message_type, payload).with_source(source_id);
        self.dispatch_local(&envelope).await;
        self.deliver_to_children(&envelope).await;
    }

    async fn deliver_to_children(&self, envelope: &Envelope) {
        let children: Vec<Arc<dyn ChildSink>> = {
            let map = self.children.read().await;
            map.values().map(|c| c.sink.clone()).collect()
        };
        for sink in children {
            let env = envelope.clone();
            tokio::spawn(async move {
                if let Err(err) = sink.deliver(env).await {
                    warn!(error = %err, "broadcast delivery to child failed");
                }
            });
        }
    }

    /// Send directly to one registered child, resolving once delivery
    /// completes or the child is declared lost, whichever comes first
    /// (spec §4.B: peer death "cancel[s] any pending send futures with a
    /// transport error").
    pub async fn send(
        &self,
        dest_id: &str,
        message_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<(), RailyardError> {
        let (sink, cancel) = {
            let children = self.children.read().await;
            let entry = children.get(dest_id).ok_or_else(|| {
                RailyardError::TransportError(format!("no such child: {dest_id}"))
            })?;
            (entry.sink.clone(), entry.cancel.clone())
        };

        let request_id = uuid::Uuid::new_v4().to_string();
        let envelope = Envelope::new(message_type, payload)
            .with_dest(dest_id.to_string())
            .with_request_id(request_id);

        tokio::select! {
            result = sink.deliver(envelope) => result,
            _ = cancel.cancelled() => Err(RailyardError::PeerLost { worker_id: dest_id.to_string() }),
        }
    }

    pub async fn register_child(&self, child_id: impl Into<String>, sink: Arc<dyn ChildSink>) {
        let child_id = child_id.into();
        debug!(child_id = %child_id, "registering transport child");
        let mut children = self.children.write().await;
        children.insert(
            child_id,
            ChildEntry {
                sink,
                cancel: CancellationToken::new(),
            },
        );
    }

    /// Mark a child dead: cancel its pending sends, drop its registration,
    /// and emit the synthetic `peer.lost` event.
    pub async fn peer_lost(&self, child_id: &str) {
        let entry = {
            let mut children = self.children.write().await;
            children.remove(child_id)
        };
        if let Some(entry) = entry {
            entry.cancel.cancel();
        }
        self.broadcast_local("peer.lost", serde_json::json!({ "workerId": child_id }))
            .await;
    }

    pub async fn child_ids(&self) -> Vec<String> {
        self.children.read().await.keys().cloned().collect()
    }

    /// Feed an envelope received from outside this process (a child's
    /// stdout IPC stream, typically) to local listeners only — it is
    /// never re-forwarded to this transport's own children, since that
    /// would loop it back toward its originator.
    pub async fn inject_local(&self, envelope: Envelope) {
        self.dispatch_local(&envelope).await;
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new_root()
    }
}
