// src/entity/mod.rs

//! Runtime nodes for the configuration tree and the per-pass traversal.
//!
//! Entities are built fresh from the configuration on every pass and handed
//! to the store as `Arc<dyn Actioner>`; their trackers are rehydrated with
//! the hash the store recorded on the previous pass so unchanged entities
//! come back as `Checked` instead of `Added`.
//!
//! The traversal is the single place where nodes, structural edges, and
//! pattern-mapping candidates are produced: one recursive walk per pass.

pub mod directory;
pub mod exec;
pub mod file;
pub mod project;
pub mod render;

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use crate::config::{DirectoryConfig, ExecConfig, FileConfig};
use crate::errors::{MetaforgeError, Result};
use crate::mapping::Scope;
use crate::store::Store;
use crate::track::{State, Tracker};

pub use project::process_project;

/// Per-pass traversal state.
#[derive(Debug)]
pub struct Walk {
    /// Pass counter; drives the tracker's per-pass idempotence.
    pub pass: u64,
    /// Root of the source (meta work) tree, for `import` resolution.
    pub source_root: std::path::PathBuf,
    /// Directory identifiers seen this pass; repeats mean the configuration
    /// (usually via imports) loops.
    visited: HashSet<String>,
}

impl Walk {
    pub fn new(pass: u64, source_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            pass,
            source_root: source_root.into(),
            visited: HashSet::new(),
        }
    }

    /// Record a directory identifier, failing on a revisit.
    fn visit(&mut self, id: &str) -> Result<()> {
        if !self.visited.insert(id.to_string()) {
            return Err(MetaforgeError::TraversalCycle(id.to_string()));
        }
        Ok(())
    }
}

/// What a parent passes down to its direct children.
#[derive(Debug, Clone)]
pub(crate) struct NodeCtx {
    /// Identifier of the parent node; every child links `parent -> child`.
    pub id: String,
    /// Source path of the enclosing scope, relative to the source root.
    pub src_path: String,
    /// Destination path of the enclosing scope, relative to the dest root.
    pub dst_path: String,
    /// Variables merged down from all ancestors.
    pub vars: BTreeMap<String, String>,
    /// Inherited copy-only default for files.
    pub copy_only: bool,
}

/// Shared lifecycle holder embedded by every entity: the tracker behind a
/// mutex so `Arc`-shared nodes satisfy the `&self` Actioner mutators.
#[derive(Debug)]
pub(crate) struct Lifecycle(Mutex<Tracker>);

impl Lifecycle {
    pub fn new(prior: Option<String>) -> Self {
        let tracker = match prior {
            Some(hash) if !hash.is_empty() => Tracker::with_prior(hash),
            _ => Tracker::new(),
        };
        Self(Mutex::new(tracker))
    }

    pub fn process_state(&self, pass: u64, content: &str) {
        self.0.lock().expect("lifecycle lock").process_state(pass, content);
    }

    pub fn state(&self) -> State {
        self.0.lock().expect("lifecycle lock").state()
    }

    pub fn hash(&self) -> String {
        self.0.lock().expect("lifecycle lock").hash()
    }

    pub fn flag(&self) {
        self.0.lock().expect("lifecycle lock").flag_state();
    }

    pub fn clear(&self) {
        self.0.lock().expect("lifecycle lock").clear_state();
    }

    pub fn remove(&self) {
        self.0.lock().expect("lifecycle lock").remove_state();
    }
}

/// Join two `/`-separated relative paths, tolerating empty sides.
pub(crate) fn join_path(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a}/{b}"),
    }
}

/// Apply a `src-ovr` / `dst-ovr` style override to a derived path.
///
/// - `/<path>` replaces the whole derived path (relative to the root)
/// - `.<path>` is resolved against the derived path's parent (a sibling)
/// - anything else is appended to the derived path
pub(crate) fn modify_path(derived: &str, modify: Option<&str>) -> String {
    let Some(modify) = modify.filter(|m| !m.is_empty()) else {
        return derived.to_string();
    };
    if let Some(rooted) = modify.strip_prefix('/') {
        return rooted.to_string();
    }
    if modify.starts_with('.') {
        let parent = derived.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        let sibling = modify.trim_start_matches("./");
        return join_path(parent, sibling);
    }
    join_path(derived, modify)
}

/// Process the direct children of a scope: files and execs are created and
/// offered to the scope, directories recurse and bubble their unresolved
/// candidates back up.
pub(crate) fn process_children(
    directories: &BTreeMap<String, DirectoryConfig>,
    files: &BTreeMap<String, FileConfig>,
    execs: &BTreeMap<String, ExecConfig>,
    parent: &NodeCtx,
    scope: &mut Scope,
    store: &Store,
    walk: &mut Walk,
) -> Result<()> {
    for (name, cfg) in files {
        let id = file::process(name, cfg, parent, store, walk)?;
        scope.offer(&id)?;
    }

    for (name, cfg) in execs {
        let id = exec::process(name, cfg, parent, store, walk)?;
        scope.offer(&id)?;
    }

    for (name, cfg) in directories {
        let (id, leftover) = directory::process(name, cfg, parent, scope, store, walk)?;
        scope.offer(&id)?;
        scope.absorb(leftover);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_tolerates_empty_sides() {
        assert_eq!(join_path("", "app"), "app");
        assert_eq!(join_path("app", ""), "app");
        assert_eq!(join_path("app", "sub"), "app/sub");
    }

    #[test]
    fn modify_path_override_forms() {
        assert_eq!(modify_path("app/sub", None), "app/sub");
        assert_eq!(modify_path("app/sub", Some("/lib")), "lib");
        assert_eq!(modify_path("app/sub", Some("./other")), "app/other");
        assert_eq!(modify_path("app/sub", Some("extra")), "app/sub/extra");
    }

    #[test]
    fn walk_reports_revisits() {
        let mut walk = Walk::new(1, "work");
        walk.visit("dir:app").unwrap();
        let err = walk.visit("dir:app").unwrap_err();
        assert!(matches!(err, MetaforgeError::TraversalCycle(_)));
    }
}
