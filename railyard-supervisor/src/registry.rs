//! Process registry persisted to a well-known temp-directory path so an
//! orphan reaper can clean up spawned children after a crash-restart
//! (spec §4.C, §6 "Process registry").

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

/// On-disk shape: `{pid: int[], writerPid: int, writtenAt: timestamp}`.
/// Readers must tolerate partial/old data (spec §5 shared-resource
/// policy); writers always rewrite the whole file atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub pid: Vec<u32>,
    #[serde(rename = "writerPid")]
    pub writer_pid: u32,
    #[serde(rename = "writtenAt")]
    pub written_at: i64,
}

pub struct ProcessRegistry {
    path: PathBuf,
    writer_pid: u32,
}

impl ProcessRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer_pid: std::process::id(),
        }
    }

    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("railyard-process-registry.json")
    }

    async fn load(&self) -> RegistryDocument {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(error = %err, "process registry contained invalid JSON, starting fresh");
                RegistryDocument::default()
            }),
            Err(_) => RegistryDocument::default(),
        }
    }

    /// Atomic write-temp + rename, per spec §6.
    async fn save(&self, doc: &RegistryDocument) -> std::io::Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(doc).expect("registry document is always valid JSON");
        fs::write(&tmp_path, bytes).await?;
        fs::rename(&tmp_path, &self.path).await
    }

    pub async fn add_pid(&self, pid: u32) -> std::io::Result<()> {
        let mut doc = self.load().await;
        if !doc.pid.contains(&pid) {
            doc.pid.push(pid);
        }
        doc.writer_pid = self.writer_pid;
        doc.written_at = now_millis();
        self.save(&doc).await
    }

    pub async fn remove_pid(&self, pid: u32) -> std::io::Result<()> {
        let mut doc = self.load().await;
        doc.pid.retain(|p| *p != pid);
        doc.writer_pid = self.writer_pid;
        doc.written_at = now_millis();
        self.save(&doc).await
    }

    pub async fn document(&self) -> RegistryDocument {
        self.load().await
    }

    /// Sweep entries whose process is no longer alive (or whose record is
    /// older than `ttl_millis`), killing any that are genuinely orphaned.
    /// Never touches a PID that is still parented by a live process —
    /// the explicit guard against friendly-fire during test suites
    /// (spec §4.I cleanup manager).
    pub async fn sweep_stale(&self, ttl_millis: i64) -> std::io::Result<Vec<u32>> {
        let mut doc = self.load().await;
        let now = now_millis();
        if now - doc.written_at < ttl_millis {
            return Ok(Vec::new());
        }
        let mut reaped = Vec::new();
        for pid in std::mem::take(&mut doc.pid) {
            if !process_is_alive(pid) {
                continue;
            }
            if process_is_orphaned(pid) {
                kill_pid(pid);
                reaped.push(pid);
            } else {
                doc.pid.push(pid);
            }
        }
        doc.writer_pid = self.writer_pid;
        doc.written_at = now;
        self.save(&doc).await?;
        Ok(reaped)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn process_is_orphaned(pid: u32) -> bool {
    // A process reparented to pid 1 (init) after its original parent
    // exited is treated as orphaned; anything still held by a live
    // parent is left alone.
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
