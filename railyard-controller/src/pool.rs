//! Worker pool (spec §4.H "Worker pool rules"): fixed number of lanes,
//! each holding at most one live worker, created lazily and replaced on
//! death or restart. Each lane has its own lock so spawning one lane's
//! worker never blocks another lane's dispatch.

use std::sync::Arc;

use railyard_core::RailyardError;
use railyard_worker::Worker;
use tokio::sync::Mutex;

use crate::factory::WorkerFactory;

pub struct WorkerPool {
    factory: Arc<dyn WorkerFactory>,
    slots: Vec<Mutex<Option<Arc<dyn Worker>>>>,
}

impl WorkerPool {
    pub fn new(factory: Arc<dyn WorkerFactory>, capacity: usize) -> Self {
        Self {
            factory,
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the lane's current worker, spawning one if the lane is
    /// empty (spec: "workers are created lazily up to `workerLimit`").
    pub async fn worker_for_lane(&self, lane: usize) -> Result<Arc<dyn Worker>, RailyardError> {
        let mut slot = self.slots[lane].lock().await;
        if slot.is_none() {
            *slot = Some(self.factory.spawn_worker().await?);
        }
        Ok(slot.as_ref().expect("just populated").clone())
    }

    /// Kills the lane's current worker (if any) and spawns a replacement.
    pub async fn replace(&self, lane: usize) -> Result<Arc<dyn Worker>, RailyardError> {
        let old = self.slots[lane].lock().await.take();
        if let Some(old) = old {
            let _ = old.kill(None).await;
        }
        self.worker_for_lane(lane).await
    }

    /// Kills every live worker without replacing them (spec: "on shutdown
    /// the controller issues `kill` to every worker").
    pub async fn kill_all(&self) {
        for slot in &self.slots {
            let worker = slot.lock().await.take();
            if let Some(worker) = worker {
                let _ = worker.kill(None).await;
            }
        }
    }
}
