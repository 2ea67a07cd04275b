//! Cluster-wide file slot coordination (spec §4.F).

pub mod client;
pub mod server;

pub use client::{BinaryFile, FsStoreClient, ScreenshotFile, TextFile};
pub use server::{new_request_id, FsStoreServer, ReleaseToken};

#[cfg(test)]
mod tests {
    use super::*;
    use railyard_core::{FileAction, FileMeta};
    use std::sync::Arc;
    use std::time::Duration;

    fn meta_named(name: &str) -> FileMeta {
        FileMeta {
            file_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn lock_then_unlink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(FsStoreServer::with_defaults(dir.path().to_path_buf()));
        let client = FsStoreClient::new(server.clone(), "w1");

        let token = client.acquire(FileAction::Lock, meta_named("a.log")).await.unwrap();
        client.release(&token).await;

        let unlink_token = client
            .acquire(FileAction::Unlink, meta_named("a.log"))
            .await
            .unwrap();
        client.release(&unlink_token).await;

        let err = client.acquire(FileAction::Lock, meta_named("a.log")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn lock_fairness_two_workers() {
        // Scenario 5 (spec §8): W1 acquires, writes, releases after a
        // delay; W2 must only observe the grant after release.
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(FsStoreServer::with_defaults(dir.path().to_path_buf()));
        let w1 = FsStoreClient::new(server.clone(), "w1");
        let w2 = FsStoreClient::new(server.clone(), "w2");

        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let token1 = w1.acquire(FileAction::Lock, meta_named("a.log")).await.unwrap();
        order.lock().await.push("w1-acquired");

        let order2 = order.clone();
        let w2_task = tokio::spawn(async move {
            let token2 = w2.acquire(FileAction::Lock, meta_named("a.log")).await.unwrap();
            order2.lock().await.push("w2-acquired");
            w2.release(&token2).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().await.push("w1-releasing");
        w1.release(&token1).await;
        w2_task.await.unwrap();

        let seen = order.lock().await.clone();
        assert_eq!(seen, vec!["w1-acquired", "w1-releasing", "w2-acquired"]);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(FsStoreServer::with_defaults(dir.path().to_path_buf()));
        let client = FsStoreClient::new(server, "w1");
        let token = client.acquire(FileAction::Lock, meta_named("x.txt")).await.unwrap();
        client.release(&token).await;
        client.release(&token).await;
    }

    #[tokio::test]
    async fn worker_disconnect_releases_outstanding_lock() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(FsStoreServer::with_defaults(dir.path().to_path_buf()));
        let w1 = FsStoreClient::new(server.clone(), "w1");
        let w2 = FsStoreClient::new(server.clone(), "w2");

        let _token1 = w1.acquire(FileAction::Lock, meta_named("a.log")).await.unwrap();
        server.release_worker("w1").await;

        let token2 = w2.acquire(FileAction::Lock, meta_named("a.log")).await.unwrap();
        w2.release(&token2).await;
    }
}
