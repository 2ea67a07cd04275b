//! Shared data model (spec §3).
//!
//! These types are plain data: they cross process boundaries over
//! Transport, so every public field here must stay serializable and free
//! of host-only handles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single project file participating in a `ModuleGraph`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleFile {
    pub resolved_path: String,
    pub bytes: Vec<u8>,
}

/// Mapping `AbsolutePath -> Mapping RequireSpec -> { resolvedPath, bytes }`.
///
/// Invariant: every resolved path that appears as a value also appears as
/// a key (possibly with an empty dependency map for leaves). Non-project
/// modules (platform builtins, third-party packages) are excluded.
/// Cycles are allowed; the sandbox handles them by returning the
/// partially-initialized exports object when re-entered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleGraph {
    files: BTreeMap<String, BTreeMap<String, ModuleFile>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `path` exists as a key, creating an empty dependency map if
    /// it is new. Used both when adding a leaf and before inserting an edge.
    pub fn ensure_file(&mut self, path: impl Into<String>) {
        self.files.entry(path.into()).or_default();
    }

    /// Record that `from` requires `spec`, resolving to `resolved` whose
    /// contents are `bytes`. Maintains the graph invariant by also
    /// ensuring `resolved` exists as a key.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        spec: impl Into<String>,
        resolved: impl Into<String>,
        bytes: Vec<u8>,
    ) {
        let resolved = resolved.into();
        self.ensure_file(&resolved);
        self.files.entry(from.into()).or_default().insert(
            spec.into(),
            ModuleFile {
                resolved_path: resolved,
                bytes,
            },
        );
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn dependencies_of(&self, path: &str) -> Option<&BTreeMap<String, ModuleFile>> {
        self.files.get(path)
    }

    pub fn resolve(&self, from: &str, spec: &str) -> Option<&ModuleFile> {
        self.files.get(from).and_then(|deps| deps.get(spec))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|s| s.as_str())
    }

    /// `merge(a, b)` — unions two graphs, preserving the key/value
    /// invariant. Edges in `other` win on conflicting `(from, spec)` pairs.
    pub fn merge(mut self, other: ModuleGraph) -> ModuleGraph {
        for (from, deps) in other.files {
            let entry = self.files.entry(from).or_default();
            for (spec, file) in deps {
                entry.insert(spec, file);
            }
        }
        self
    }

    /// Validate the key/value invariant: every resolved path referenced by
    /// an edge must also appear as a key in the graph.
    pub fn check_invariant(&self) -> Result<(), String> {
        for (from, deps) in &self.files {
            for file in deps.values() {
                if !self.files.contains_key(&file.resolved_path) {
                    return Err(format!(
                        "module graph invariant violated: {from} requires {} which is not a key",
                        file.resolved_path
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A discovered, compiled test file plus its scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFile {
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub dependencies: ModuleGraph,
}

/// Scalar scheduling parameters (timeout, retries used so far, custom tags).
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// A queued or in-flight test, mutated only by the Controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEntry {
    pub id: String,
    pub file: TestFile,
    pub parameters: Parameters,
    pub env_parameters: Parameters,
    pub retries_used: u32,
}

impl TestEntry {
    pub fn new(file: TestFile) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file,
            parameters: Parameters::new(),
            env_parameters: Parameters::new(),
            retries_used: 0,
        }
    }

    pub fn path_display(&self) -> String {
        self.file.path.display().to_string()
    }
}

/// Worker lifecycle state (spec §3 "Worker state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Idle,
    Busy,
    Dying,
    Dead,
}

/// FS-Store request action (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum FileAction {
    Lock,
    Access,
    Unlink,
}

/// Uniqueness policy for synthesized filenames (spec §4.F `Meta`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniqPolicy {
    Global,
    Worker,
}

impl Default for UniqPolicy {
    fn default() -> Self {
        UniqPolicy::Global
    }
}

/// Metadata accompanying an FS-Store request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMeta {
    pub ext: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub uniq_policy: Option<UniqPolicy>,
}

/// A single FS-Store request (spec §4.F `Request`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRequest {
    pub request_id: String,
    pub worker_id: String,
    pub action: FileAction,
    pub meta: FileMeta,
}

/// State of an outstanding grant for one `fullPath` (spec §3 "File slot").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSlot {
    pub request_id: String,
    pub worker_id: String,
    pub full_path: String,
    pub action: FileAction,
    pub queue_position: usize,
}

/// Pool-worker concurrency limit: either a fixed count or `local`
/// (everything runs in the controller process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerLimit {
    Count(usize),
    Local,
}

impl WorkerLimit {
    /// Effective maximum number of simultaneously-executing tests.
    pub fn as_count(&self) -> usize {
        match self {
            WorkerLimit::Count(n) => *n,
            WorkerLimit::Local => 1,
        }
    }
}
