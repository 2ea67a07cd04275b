//! Watches the shared Transport for `peer.lost` events (spec §4.H "A
//! worker that emits `peer.lost` is removed from the pool, its in-flight
//! test is resolved as failure").

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use railyard_transport::{Subscription, Transport};
use tokio::sync::RwLock;

pub struct PeerLostWatcher {
    lost: Arc<RwLock<HashSet<String>>>,
    _subscription: Subscription,
}

impl PeerLostWatcher {
    pub async fn attach(transport: &Transport) -> Self {
        let lost = Arc::new(RwLock::new(HashSet::new()));
        let lost_write = lost.clone();
        let subscription = transport
            .on("peer.lost", move |envelope| {
                let lost = lost_write.clone();
                async move {
                    if let Some(id) = envelope.payload.get("workerId").and_then(|v| v.as_str()) {
                        lost.write().await.insert(id.to_string());
                    }
                }
            })
            .await;
        Self {
            lost,
            _subscription: subscription,
        }
    }

    /// Resolves once `worker_id` has been reported lost. Polls rather
    /// than using `Notify` to avoid the missed-wakeup window when a
    /// waiter hasn't registered yet before the notification fires.
    pub async fn wait_for(&self, worker_id: &str) {
        loop {
            if self.lost.read().await.contains(worker_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
