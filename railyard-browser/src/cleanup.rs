//! Process-wide cleanup manager (spec §4.I, §9 "Global singletons ...
//! represented as a single owned object with an explicit init/shutdown
//! lifecycle"). Real browser drivers can orphan native processes (a
//! crashed WebDriver binary, a browser left behind by a killed worker);
//! this keeps a persisted registry of the PIDs a session has spawned and
//! reaps whichever ones are actually orphaned, never a live, parented one.
//!
//! Built directly on [`railyard_supervisor::ProcessRegistry`] rather than
//! a second registry implementation: the on-disk shape, atomic
//! write-temp-then-rename, and orphan detection (`PPid == 1`) are
//! identical needs.

use std::path::PathBuf;
use std::time::Duration;

use railyard_supervisor::ProcessRegistry;
use tracing::warn;

pub struct CleanupManager {
    registry: ProcessRegistry,
    sweep_interval: Duration,
}

impl CleanupManager {
    pub fn new(registry_path: PathBuf, sweep_interval: Duration) -> Self {
        Self {
            registry: ProcessRegistry::new(registry_path),
            sweep_interval,
        }
    }

    pub fn with_default_path(sweep_interval: Duration) -> Self {
        Self::new(ProcessRegistry::default_path(), sweep_interval)
    }

    pub async fn track(&self, pid: u32) -> std::io::Result<()> {
        self.registry.add_pid(pid).await
    }

    pub async fn untrack(&self, pid: u32) -> std::io::Result<()> {
        self.registry.remove_pid(pid).await
    }

    /// Spawn the periodic stale-entry sweep. The returned handle is owned
    /// by the caller so shutdown can abort it explicitly.
    pub fn spawn_periodic_sweep(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.sweep_interval).await;
                if let Err(err) = self
                    .registry
                    .sweep_stale(self.sweep_interval.as_millis() as i64)
                    .await
                {
                    warn!(error = %err, "cleanup manager sweep failed");
                }
            }
        })
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }
}

impl Drop for CleanupManager {
    /// Best-effort synchronous reap on graceful shutdown (spec §4.I
    /// "process-exit handlers"). This only fires on a normal `drop`, not
    /// on `SIGKILL` or a hard process abort — there is no portable way to
    /// intercept those from user code, so the persisted registry plus the
    /// next process's own sweep is the backstop for that case.
    fn drop(&mut self) {
        reap_orphans_blocking(self.registry.path());
    }
}

fn reap_orphans_blocking(path: &std::path::Path) {
    let Ok(bytes) = std::fs::read(path) else {
        return;
    };
    let Ok(doc) = serde_json::from_slice::<railyard_supervisor::RegistryDocument>(&bytes) else {
        return;
    };
    for pid in doc.pid {
        if process_is_orphaned(pid) {
            kill_pid(pid);
        }
    }
}

#[cfg(unix)]
fn process_is_orphaned(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/status"))
        .ok()
        .and_then(|status| {
            status.lines().find_map(|line| {
                line.strip_prefix("PPid:")
                    .map(|v| v.trim().parse::<u32>().unwrap_or(1) == 1)
            })
        })
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn process_is_orphaned(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
    unsafe {
        libc::kill(pid as i32, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_pid(_pid: u32) {}
