//! Static dependency builder (spec §4.E).
//!
//! Walks a test file's `require`/`import` graph using a literal-specifier
//! regex scan rather than a full parser — the specification limits
//! itself to literal specifiers, so a lightweight scan over source bytes
//! is sufficient and keeps this crate free of a JS/TS parser dependency.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use railyard_core::{ModuleGraph, RailyardError};
use regex::Regex;
use tracing::warn;

const RESOLUTION_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".jsx", ".ts", ".tsx"];
const INDEX_FILES: &[&str] = &["index.js", "index.ts", "index.mjs"];

fn literal_specifier_regex() -> Regex {
    Regex::new(
        r#"(?:require\s*\(\s*["']([^"']+)["']\s*\)|import(?:\s+[\w*{}\s,]+\s+from)?\s*\(?\s*["']([^"']+)["']\s*\)?)"#,
    )
    .expect("static regex is valid")
}

fn dynamic_specifier_regex() -> Regex {
    Regex::new(r#"import\s*\(\s*([^"'`)][^)]*)\)"#).expect("static regex is valid")
}

fn is_project_relative(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/')
}

fn under_third_party(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("node_modules") | Some("vendor") | Some("third_party")
        )
    })
}

/// Resolve `spec` relative to `from_dir`, trying the literal path, then
/// each extension, then each index file under a directory (spec §4.E
/// "platform resolution rules: extensions, index files").
fn resolve(from_dir: &Path, spec: &str) -> Option<PathBuf> {
    let candidate = from_dir.join(spec);
    if candidate.is_file() {
        return Some(normalize(&candidate));
    }
    for ext in RESOLUTION_EXTENSIONS {
        let with_ext = PathBuf::from(format!("{}{ext}", candidate.display()));
        if with_ext.is_file() {
            return Some(normalize(&with_ext));
        }
    }
    if candidate.is_dir() {
        for index in INDEX_FILES {
            let index_path = candidate.join(index);
            if index_path.is_file() {
                return Some(normalize(&index_path));
            }
        }
    }
    None
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Statically build the `ModuleGraph` rooted at `entry`.
pub fn build_module_graph(entry: &Path) -> Result<ModuleGraph, RailyardError> {
    let mut graph = ModuleGraph::new();
    let mut visiting = HashSet::new();
    let entry = normalize(entry);
    walk(&entry, &mut graph, &mut visiting)?;
    Ok(graph)
}

fn walk(
    path: &Path,
    graph: &mut ModuleGraph,
    visiting: &mut HashSet<PathBuf>,
) -> Result<(), RailyardError> {
    let key = path.display().to_string();
    if graph.contains_file(&key) || visiting.contains(path) {
        // Already walked, or a cycle — short-circuit (spec §4.E).
        return Ok(());
    }
    visiting.insert(path.to_path_buf());
    graph.ensure_file(&key);

    let source = std::fs::read(path)
        .map_err(|e| RailyardError::DependencyError(format!("cannot read {}: {e}", path.display())))?;
    let text = String::from_utf8_lossy(&source);

    let literal_re = literal_specifier_regex();
    let dynamic_re = dynamic_specifier_regex();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    for caps in dynamic_re.captures_iter(&text) {
        let expr = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        warn!(file = %path.display(), expr, "dynamic import specifier ignored by static scan");
    }

    let mut deps: BTreeMap<String, PathBuf> = BTreeMap::new();
    for caps in literal_re.captures_iter(&text) {
        let spec = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        if spec.is_empty() || !is_project_relative(spec) {
            // Platform builtin or third-party package: out of scope.
            continue;
        }
        let Some(resolved) = resolve(dir, spec) else {
            return Err(RailyardError::DependencyError(format!(
                "{}: cannot resolve \"{spec}\"",
                path.display()
            )));
        };
        if under_third_party(&resolved) {
            continue;
        }
        deps.insert(spec.to_string(), resolved);
    }

    for (spec, resolved) in &deps {
        let bytes = std::fs::read(resolved)
            .map_err(|e| RailyardError::DependencyError(format!("cannot read {}: {e}", resolved.display())))?;
        graph.add_edge(&key, spec.clone(), resolved.display().to_string(), bytes);
    }

    visiting.remove(path);
    for resolved in deps.values() {
        walk(resolved, graph, visiting)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn builds_graph_for_simple_chain() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "require('./b');").unwrap();
        fs::write(dir.path().join("b.js"), "module.exports = 1;").unwrap();

        let graph = build_module_graph(&dir.path().join("a.js")).unwrap();
        assert_eq!(graph.file_count(), 2);
        graph.check_invariant().unwrap();
    }

    #[test]
    fn handles_cycles_without_infinite_recursion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "require('./b');").unwrap();
        fs::write(dir.path().join("b.js"), "require('./a');").unwrap();

        let graph = build_module_graph(&dir.path().join("a.js")).unwrap();
        assert_eq!(graph.file_count(), 2);
        graph.check_invariant().unwrap();
    }

    #[test]
    fn skips_bare_specifiers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "require('lodash'); require('./b');").unwrap();
        fs::write(dir.path().join("b.js"), "module.exports = 1;").unwrap();

        let graph = build_module_graph(&dir.path().join("a.js")).unwrap();
        assert_eq!(graph.file_count(), 2);
    }

    #[test]
    fn unresolvable_literal_spec_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "require('./missing');").unwrap();

        let err = build_module_graph(&dir.path().join("a.js")).unwrap_err();
        assert!(matches!(err, RailyardError::DependencyError(_)));
    }

    #[test]
    fn resolves_extensionless_and_index_specs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/index.js"), "module.exports = 1;").unwrap();
        fs::write(dir.path().join("helper.ts"), "export const x = 1;").unwrap();
        fs::write(
            dir.path().join("a.js"),
            "require('./lib'); require('./helper');",
        )
        .unwrap();

        let graph = build_module_graph(&dir.path().join("a.js")).unwrap();
        assert_eq!(graph.file_count(), 3);
    }
}
