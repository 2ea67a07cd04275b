//! Turns a file on disk into a [`TestEntry`] ready for [`crate::Railyard::run_queue`]
//! (spec §2: "the Controller reads test files via `fs-reader`"). Discovery —
//! walking a directory tree to decide *which* files are tests — stays a host
//! concern; this module only covers the read-one-file-and-build-its-graph
//! step, through the `FileReader` port rather than a bare `std::fs` call.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use railyard_core::{FileReader, RailyardError, TestEntry, TestFile};

/// Default [`FileReader`] backed directly by the host filesystem.
#[derive(Clone, Copy, Default)]
pub struct StdFileReader;

#[async_trait]
impl FileReader for StdFileReader {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, RailyardError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| RailyardError::DependencyError(format!("cannot read {}: {e}", path.display())))
    }
}

/// Reads `path` through `reader`, builds its dependency graph with
/// `railyard-depgraph`, and wraps both into a fresh [`TestEntry`].
pub async fn load_test_entry(reader: &dyn FileReader, path: &Path) -> Result<TestEntry, RailyardError> {
    let content = reader.read(path).await?;
    let dependencies = railyard_depgraph::build_module_graph(path)?;
    Ok(TestEntry::new(TestFile {
        path: path.to_path_buf(),
        content,
        dependencies,
    }))
}

/// Convenience over [`load_test_entry`] for a whole batch of paths, in order.
pub async fn load_test_entries(reader: &dyn FileReader, paths: &[PathBuf]) -> Result<Vec<TestEntry>, RailyardError> {
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        entries.push(load_test_entry(reader, path).await?);
    }
    Ok(entries)
}
