//! FS-Store client surface exposed inside each worker (spec §4.F).

use std::future::Future;
use std::sync::Arc;

use railyard_core::{FileAction, FileMeta, FileRequest, RailyardError};

use crate::server::{new_request_id, FsStoreServer, ReleaseToken};

/// In-process client talking directly to a server instance, used by
/// `LocalWorker` and by the controller side of `RemoteWorker`. A worker
/// running as a separate process reaches the same server over Transport's
/// `fs.*` message types instead; that process is the host-supplied worker
/// binary (spec §1: out of scope here), not code in this workspace.
#[derive(Clone)]
pub struct FsStoreClient {
    server: Arc<FsStoreServer>,
    worker_id: String,
}

impl FsStoreClient {
    pub fn new(server: Arc<FsStoreServer>, worker_id: impl Into<String>) -> Self {
        Self {
            server,
            worker_id: worker_id.into(),
        }
    }

    pub async fn acquire(
        &self,
        action: FileAction,
        meta: FileMeta,
    ) -> Result<ReleaseToken, RailyardError> {
        let request = FileRequest {
            request_id: new_request_id(),
            worker_id: self.worker_id.clone(),
            action,
            meta,
        };
        self.server.acquire(request).await
    }

    pub async fn release(&self, token: &ReleaseToken) {
        self.server.release(token).await;
    }

    pub async fn wait_for_unlock(&self, full_path: &str) {
        self.server.wait_for_unlock(full_path).await;
    }

    /// Guarantee begin/commit/rollback of a Lock+Access pair around `f`:
    /// the lock is acquired, `f` runs with the resolved path, and the
    /// lock is released whether `f` succeeds or fails.
    pub async fn transaction<F, Fut, T>(&self, meta: FileMeta, f: F) -> Result<T, RailyardError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, RailyardError>>,
    {
        let token = self.acquire(FileAction::Lock, meta).await?;
        let result = f(token.full_path.clone()).await;
        self.release(&token).await;
        result
    }
}

/// A text artifact: acquires a slot, owns the path, releases on drop via
/// explicit `close()` (files are plain data, not RAII-guarded, since
/// release must be awaitable).
pub struct TextFile {
    client: FsStoreClient,
    token: ReleaseToken,
}

impl TextFile {
    pub async fn create(client: &FsStoreClient, meta: FileMeta) -> Result<Self, RailyardError> {
        let token = client.acquire(FileAction::Lock, meta).await?;
        Ok(Self {
            client: client.clone(),
            token,
        })
    }

    pub fn path(&self) -> &str {
        &self.token.full_path
    }

    pub async fn write(&self, contents: &str) -> std::io::Result<()> {
        tokio::fs::write(&self.token.full_path, contents).await
    }

    pub async fn read(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(&self.token.full_path).await
    }

    pub async fn close(self) {
        self.client.release(&self.token).await;
    }
}

/// A binary artifact (trace, video, coverage blob).
pub struct BinaryFile {
    client: FsStoreClient,
    token: ReleaseToken,
}

impl BinaryFile {
    pub async fn create(client: &FsStoreClient, meta: FileMeta) -> Result<Self, RailyardError> {
        let token = client.acquire(FileAction::Lock, meta).await?;
        Ok(Self {
            client: client.clone(),
            token,
        })
    }

    pub fn path(&self) -> &str {
        &self.token.full_path
    }

    pub async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(&self.token.full_path, bytes).await
    }

    pub async fn close(self) {
        self.client.release(&self.token).await;
    }
}

/// A screenshot artifact — PNG bytes plus the usual Lock lifecycle.
pub struct ScreenshotFile {
    inner: BinaryFile,
}

impl ScreenshotFile {
    pub async fn create(client: &FsStoreClient, meta: FileMeta) -> Result<Self, RailyardError> {
        Ok(Self {
            inner: BinaryFile::create(client, meta).await?,
        })
    }

    pub fn path(&self) -> &str {
        self.inner.path()
    }

    pub async fn save(&self, png_bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write(png_bytes).await
    }

    pub async fn close(self) {
        self.inner.close().await;
    }
}
