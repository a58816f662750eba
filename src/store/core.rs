// src/store/core.rs

//! Pure, single-threaded state behind the graph store.
//!
//! `StoreCore` owns the node table and the DAG and implements every store
//! operation as a plain method. The channel shell in [`crate::store`] feeds
//! it one request at a time; tests can drive it directly without threads.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{MetaforgeError, Result};
use crate::graph::Dag;
use crate::store::Actioner;
use crate::track::State;

pub struct StoreCore {
    refs: HashMap<String, Arc<dyn Actioner>>,
    graph: Dag,
}

impl StoreCore {
    pub fn new() -> Self {
        Self {
            refs: HashMap::new(),
            graph: Dag::new(),
        }
    }

    /// Insert or update a node.
    ///
    /// A second add for an identifier already present this pass is a
    /// tolerated duplicate overwrite (the tree processor may visit shared
    /// structure more than once), logged but not an error.
    pub fn add_ref(&mut self, id: &str, node: Arc<dyn Actioner>) {
        if self.refs.contains_key(id) {
            debug!(id, "overwriting existing reference");
        } else {
            debug!(id, "adding reference");
        }
        self.refs.insert(id.to_string(), node);
        self.graph.add_node(id);
    }

    /// Move a node and its incident edges to a new key.
    ///
    /// Renaming a missing node, or onto an occupied key, is a hard error.
    pub fn rename_ref(&mut self, old: &str, new: &str) -> Result<()> {
        if !self.refs.contains_key(old) {
            return Err(MetaforgeError::RefNotFound(old.to_string()));
        }
        if self.refs.contains_key(new) {
            return Err(MetaforgeError::RefExists(new.to_string()));
        }
        debug!(old, new, "renaming reference");
        let node = self.refs.remove(old).expect("checked above");
        self.refs.insert(new.to_string(), node);
        self.graph.rename_node(old, new);
        Ok(())
    }

    /// Idempotent edge creation; endpoints need not exist yet.
    pub fn map_ref(&mut self, start: &str, end: &str, priority: u32) {
        debug!(start, end, "linking");
        self.graph.link(start, end, priority);
    }

    /// Force a node dirty, e.g. because a watcher saw its backing file
    /// change on disk.
    pub fn set_update(&mut self, id: &str) -> Result<()> {
        match self.refs.get(id) {
            Some(node) => {
                node.flag_state();
                Ok(())
            }
            None => Err(MetaforgeError::RefNotFound(id.to_string())),
        }
    }

    /// Compile the topological order for this pass.
    pub fn evaluate(&mut self) -> Result<()> {
        self.graph.evaluate().map_err(|members| {
            MetaforgeError::DagCycle(members.join(", "))
        })?;
        debug!(roots = ?self.graph.roots(), "graph evaluated");
        Ok(())
    }

    /// Mark phase: every node still `Stable` (not revisited this pass)
    /// becomes `Remove`.
    pub fn assess(&mut self) {
        for (id, node) in &self.refs {
            if node.state() == State::Stable {
                debug!(id = %id, "flagging for removal");
                node.remove_state();
            }
        }
    }

    /// Forward transitive dirty propagation.
    ///
    /// Every node reachable from an `Updated` node becomes `Updated` itself
    /// when it was `Stable` or `Checked`. `Added` nodes are already dirty
    /// and `Remove` nodes stay scheduled for deletion.
    pub fn propagate(&mut self) {
        let updated: Vec<String> = self
            .refs
            .iter()
            .filter(|(_, node)| node.state() == State::Updated)
            .map(|(id, _)| id.clone())
            .collect();

        for id in updated {
            for reached in self.graph.descendants_of(&id) {
                if let Some(node) = self.refs.get(&reached) {
                    if matches!(node.state(), State::Stable | State::Checked) {
                        debug!(from = %id, to = %reached, "propagating update");
                        node.flag_state();
                    }
                }
            }
        }
    }

    /// Commit the pass: surviving states demote to `Stable`; nodes flagged
    /// `Remove` are physically deleted along with their edges. This is the
    /// only point at which nodes are destroyed.
    pub fn finish(&mut self) {
        let removed: Vec<String> = self
            .refs
            .iter()
            .filter(|(_, node)| node.state() == State::Remove)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &removed {
            debug!(id = %id, "removing reference");
            self.refs.remove(id);
            self.graph.remove_node(id);
        }

        for node in self.refs.values() {
            node.clear_state();
        }
    }

    /// All nodes in topological order, optionally restricted to a kind
    /// prefix and/or to the dirty set {Updated, Added}.
    pub fn nodes(
        &self,
        selection: Option<&str>,
        changed_only: bool,
    ) -> Result<Vec<Arc<dyn Actioner>>> {
        let order = self.graph.order().ok_or(MetaforgeError::NotEvaluated)?;

        let mut result = Vec::new();
        for id in order {
            // Edges may reference nodes that were never added; skip those.
            let Some(node) = self.refs.get(id) else {
                warn!(id = %id, "graph node without a stored reference");
                continue;
            };
            if let Some(prefix) = selection {
                if !id.starts_with(prefix) {
                    continue;
                }
            }
            if changed_only && !node.state().is_changed() {
                continue;
            }
            result.push(Arc::clone(node));
        }
        Ok(result)
    }

    /// All `file:` nodes transitively preceding `id`, ancestor-first
    /// (consistent with the compiled topological order).
    pub fn parent_files(&self, id: &str) -> Result<Vec<String>> {
        let order = self.graph.order().ok_or(MetaforgeError::NotEvaluated)?;
        let ancestors = self.graph.ancestors_of(id);

        Ok(order
            .iter()
            .filter(|n| ancestors.contains(*n) && n.starts_with("file:"))
            .cloned()
            .collect())
    }

    /// Prior hash for an identifier, used to rehydrate trackers before
    /// recomputing fingerprints.
    pub fn hash_of(&self, id: &str) -> Option<String> {
        self.refs.get(id).map(|node| node.hash())
    }

    /// Graphviz rendering of the live graph (nodes flagged `Remove` and
    /// their edges are omitted).
    pub fn export_dot(&self) -> String {
        let styles = [
            ("prj:", "[style=filled, fillcolor=\"slateblue1\"]"),
            ("dir:", "[style=filled, fillcolor=\"lightblue\", shape=\"folder\"]"),
            ("file:", "[style=filled, fillcolor=\"lightgreen\", shape=\"note\"]"),
            ("exec:", "[style=filled, fillcolor=\"lightcoral\", shape=\"octagon\"]"),
        ];

        let removed = |id: &str| {
            self.refs
                .get(id)
                .map(|n| n.state() == State::Remove)
                .unwrap_or(false)
        };

        let mut out = String::from("digraph {\n");
        let mut ids: Vec<&String> = self.refs.keys().collect();
        ids.sort();
        for id in ids {
            if removed(id) {
                continue;
            }
            let style = styles
                .iter()
                .find(|(prefix, _)| id.starts_with(prefix))
                .map(|(_, s)| *s)
                .unwrap_or("");
            let _ = writeln!(out, "\t\"{id}\" {style};");
        }
        for (start, end, _) in self.graph.edges() {
            if removed(start) || removed(end) {
                continue;
            }
            let _ = writeln!(out, "\t\"{start}\" -> \"{end}\";");
        }
        out.push('}');
        out
    }
}

impl Default for StoreCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::store::{ActionContext, GraphView};
    use crate::track::Tracker;

    struct TestNode {
        id: String,
        tracker: Mutex<Tracker>,
    }

    impl TestNode {
        fn processed(id: &str, pass: u64, content: &str) -> Arc<Self> {
            let mut tracker = Tracker::new();
            tracker.process_state(pass, content);
            Arc::new(Self {
                id: id.to_string(),
                tracker: Mutex::new(tracker),
            })
        }

        fn rehydrated(id: &str, prior: &str, pass: u64, content: &str) -> Arc<Self> {
            let mut tracker = Tracker::with_prior(prior);
            tracker.process_state(pass, content);
            Arc::new(Self {
                id: id.to_string(),
                tracker: Mutex::new(tracker),
            })
        }
    }

    impl Actioner for TestNode {
        fn identifier(&self) -> String {
            self.id.clone()
        }
        fn hash(&self) -> String {
            self.tracker.lock().unwrap().hash()
        }
        fn state(&self) -> State {
            self.tracker.lock().unwrap().state()
        }
        fn flag_state(&self) {
            self.tracker.lock().unwrap().flag_state();
        }
        fn clear_state(&self) {
            self.tracker.lock().unwrap().clear_state();
        }
        fn remove_state(&self) {
            self.tracker.lock().unwrap().remove_state();
        }
        fn perform(&self, _view: &dyn GraphView, _ctx: &ActionContext) -> Result<()> {
            Ok(())
        }
        fn output(&self) -> String {
            String::new()
        }
    }

    fn core_with(ids: &[&str]) -> StoreCore {
        let mut core = StoreCore::new();
        for id in ids {
            core.add_ref(id, TestNode::processed(id, 1, id));
        }
        core
    }

    #[test]
    fn queries_require_evaluate() {
        let core = core_with(&["a"]);
        assert!(matches!(
            core.nodes(None, false),
            Err(MetaforgeError::NotEvaluated)
        ));
        assert!(matches!(
            core.parent_files("a"),
            Err(MetaforgeError::NotEvaluated)
        ));
    }

    #[test]
    fn rename_missing_is_error() {
        let mut core = core_with(&["a"]);
        assert!(matches!(
            core.rename_ref("missing", "b"),
            Err(MetaforgeError::RefNotFound(_))
        ));
        assert!(matches!(
            core.rename_ref("a", "a"),
            Err(MetaforgeError::RefExists(_))
        ));
    }

    #[test]
    fn rename_moves_edges() {
        let mut core = core_with(&["a", "b", "c"]);
        core.map_ref("a", "b", 1);
        core.map_ref("b", "c", 1);
        core.rename_ref("b", "z").unwrap();
        core.evaluate().unwrap();

        let order: Vec<String> = core
            .nodes(None, false)
            .unwrap()
            .iter()
            .map(|n| n.identifier())
            .collect();
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        assert!(pos("a") < pos("z"));
        assert!(pos("z") < pos("c"));
    }

    #[test]
    fn propagate_flags_reachable_only() {
        let mut core = core_with(&["a", "b", "c"]);
        core.map_ref("a", "b", 1);
        core.finish();

        core.set_update("a").unwrap();
        core.propagate();

        assert_eq!(core.refs["a"].state(), State::Updated);
        assert_eq!(core.refs["b"].state(), State::Updated);
        assert_eq!(core.refs["c"].state(), State::Stable);
    }

    #[test]
    fn propagate_keeps_added_and_remove() {
        let mut core = StoreCore::new();
        core.add_ref("a", TestNode::processed("a", 1, "a"));
        core.add_ref("b", TestNode::processed("b", 1, "b"));
        core.add_ref("c", TestNode::processed("c", 1, "c"));
        core.map_ref("a", "b", 1);
        core.map_ref("b", "c", 1);

        core.refs["a"].flag_state();
        core.refs["c"].remove_state();
        core.propagate();

        assert_eq!(core.refs["b"].state(), State::Added);
        assert_eq!(core.refs["c"].state(), State::Remove);
    }

    #[test]
    fn assess_then_finish_sweeps_untouched_nodes() {
        let mut core = core_with(&["a", "b"]);
        core.map_ref("a", "b", 1);
        core.finish();

        // Second pass revisits only "a".
        let prior = core.hash_of("a").unwrap();
        core.add_ref("a", TestNode::rehydrated("a", &prior, 2, "a"));
        core.assess();

        assert_eq!(core.refs["a"].state(), State::Checked);
        assert_eq!(core.refs["b"].state(), State::Remove);

        core.finish();
        assert!(core.refs.contains_key("a"));
        assert!(!core.refs.contains_key("b"));
        core.evaluate().unwrap();
        assert!(core.parent_files("a").unwrap().is_empty());
    }

    #[test]
    fn finish_is_idempotent() {
        let mut core = core_with(&["a", "b"]);
        core.finish();
        core.finish();
        for node in core.refs.values() {
            assert_eq!(node.state(), State::Stable);
        }
    }

    #[test]
    fn parent_files_ancestor_first() {
        let mut core = core_with(&["prj:p", "file:one", "file:two", "file:out"]);
        core.map_ref("prj:p", "file:one", 1);
        core.map_ref("file:one", "file:two", 1);
        core.map_ref("file:two", "file:out", 1);
        core.evaluate().unwrap();

        let parents = core.parent_files("file:out").unwrap();
        assert_eq!(parents, vec!["file:one", "file:two"]);
    }

    #[test]
    fn nodes_filters_by_prefix_and_change() {
        let mut core = core_with(&["file:a", "exec:x"]);
        core.evaluate().unwrap();

        assert_eq!(core.nodes(Some("file:"), false).unwrap().len(), 1);
        // Everything is Added after the first pass.
        assert_eq!(core.nodes(None, true).unwrap().len(), 2);

        core.finish();
        core.evaluate().unwrap();
        assert!(core.nodes(None, true).unwrap().is_empty());
    }

    #[test]
    fn export_dot_skips_removed() {
        let mut core = core_with(&["file:a", "file:b"]);
        core.map_ref("file:a", "file:b", 1);
        core.refs["file:b"].remove_state();

        let dot = core.export_dot();
        assert!(dot.contains("\"file:a\""));
        assert!(!dot.contains("\"file:b\""));
        assert!(!dot.contains("->"));
    }
}
