//! Child-process supervisor (spec §4.C): spawn, watch, and kill worker
//! children, piping their stdout/stderr to the Logger port and their IPC
//! frames onto Transport.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use railyard_core::{Logger, RailyardError};
use railyard_transport::{ChildSink, Envelope};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::registry::ProcessRegistry;

/// `{code, signal}` reported exactly once per child (spec §4.C).
#[derive(Debug, Clone)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Options for `spawn`.
#[derive(Clone, Default)]
pub struct SpawnOptions {
    pub env: Vec<(String, String)>,
    pub cwd: Option<std::path::PathBuf>,
    /// When set, the child's stdout is treated as its outbound IPC
    /// channel: each line is parsed as a JSON `Envelope` and forwarded
    /// here instead of being logged (spec §4.C/§4.G: the worker posts
    /// outcomes back over this same pipe pair). When `None`, stdout is
    /// logged like stderr — useful for plain, non-IPC child processes.
    pub inbound: Option<UnboundedSender<Envelope>>,
}

/// A handle to one spawned worker process. IPC frames are newline-
/// delimited JSON written to the child's stdin and read from its
/// stdout's dedicated side channel — here modeled simply as writing one
/// `Envelope` per line to stdin, since the worker's own stdout/stderr are
/// reserved for logs.
pub struct ChildHandle {
    pub pid: u32,
    child: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    exited: AtomicBool,
}

impl ChildHandle {
    pub async fn kill(&self, _signal: Option<i32>) -> Result<(), RailyardError> {
        if self.exited.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut child = self.child.lock().await;
        child
            .kill()
            .await
            .map_err(|e| RailyardError::TransportError(format!("kill failed: {e}")))
    }

    pub async fn wait(&self) -> ExitStatus {
        let mut child = self.child.lock().await;
        match child.wait().await {
            Ok(status) => ExitStatus {
                code: status.code(),
                #[cfg(unix)]
                signal: {
                    use std::os::unix::process::ExitStatusExt;
                    status.signal()
                },
                #[cfg(not(unix))]
                signal: None,
            },
            Err(err) => {
                warn!(error = %err, "failed to wait on child process");
                ExitStatus { code: None, signal: None }
            }
        }
    }
}

#[async_trait]
impl ChildSink for ChildHandle {
    async fn deliver(&self, envelope: Envelope) -> Result<(), RailyardError> {
        if self.exited.load(Ordering::SeqCst) {
            return Err(RailyardError::PeerLost {
                worker_id: self.pid.to_string(),
            });
        }
        let mut line = serde_json::to_vec(&envelope)
            .map_err(|e| RailyardError::TransportError(format!("encode failed: {e}")))?;
        line.push(b'\n');
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(&line)
            .await
            .map_err(|e| RailyardError::TransportError(format!("write failed: {e}")))
    }
}

/// Spawns and tracks worker child processes, registering each PID with
/// the process registry so an orphan reaper can clean up on
/// crash-restart.
pub struct Supervisor {
    registry: Arc<ProcessRegistry>,
    logger: Option<Arc<dyn Logger>>,
}

impl Supervisor {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        Self {
            registry,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Spawn a worker. Stdout/stderr are captured as line streams and
    /// forwarded to the Logger port (spec §4.C contracts).
    pub async fn spawn(
        &self,
        command: &str,
        args: &[String],
        opts: SpawnOptions,
    ) -> Result<Arc<ChildHandle>, RailyardError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| RailyardError::TransportError(format!("spawn failed: {e}")))?;
        let pid = child
            .id()
            .ok_or_else(|| RailyardError::TransportError("child exited before pid was available".into()))?;

        self.registry
            .add_pid(pid)
            .await
            .map_err(|e| RailyardError::TransportError(format!("registry write failed: {e}")))?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let logger = self.logger.clone();
        match opts.inbound {
            Some(tx) => {
                tokio::spawn(forward_envelopes(stdout, tx));
            }
            None => {
                tokio::spawn(forward_lines(stdout, logger.clone(), false));
            }
        }
        tokio::spawn(forward_lines(stderr, logger, true));

        debug!(pid, command, "spawned worker child");

        Ok(Arc::new(ChildHandle {
            pid,
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            exited: AtomicBool::new(false),
        }))
    }

    pub async fn reap(&self, handle: &ChildHandle) -> Result<(), RailyardError> {
        self.registry
            .remove_pid(handle.pid)
            .await
            .map_err(|e| RailyardError::TransportError(format!("registry write failed: {e}")))
    }
}

async fn forward_envelopes<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    tx: UnboundedSender<Envelope>,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => {
                if tx.send(envelope).is_err() {
                    break;
                }
            }
            Err(err) => warn!(error = %err, line, "malformed inbound envelope on child stdout"),
        }
    }
}

async fn forward_lines<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    logger: Option<Arc<dyn Logger>>,
    is_stderr: bool,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(logger) = &logger {
            if is_stderr {
                logger.warn(&line);
            } else {
                logger.info(&line);
            }
        }
    }
}
