// src/entity/project.rs

//! The project root node and the entry point of the per-pass traversal.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::ProjectConfig;
use crate::entity::{Lifecycle, NodeCtx, Walk, process_children};
use crate::errors::Result;
use crate::mapping::{Scope, compile_rules};
use crate::store::{ActionContext, Actioner, GraphView, Store};
use crate::track::State;

pub struct ProjectNode {
    id: String,
    life: Lifecycle,
}

/// Fields that make up the project's fingerprint. Child collections are
/// deliberately absent.
#[derive(Serialize)]
struct Seal<'a> {
    name: &'a str,
    vars: &'a BTreeMap<String, String>,
}

impl Actioner for ProjectNode {
    fn identifier(&self) -> String {
        self.id.clone()
    }
    fn hash(&self) -> String {
        self.life.hash()
    }
    fn state(&self) -> State {
        self.life.state()
    }
    fn flag_state(&self) {
        self.life.flag();
    }
    fn clear_state(&self) {
        self.life.clear();
    }
    fn remove_state(&self) {
        self.life.remove();
    }
    fn perform(&self, _view: &dyn GraphView, _ctx: &ActionContext) -> Result<()> {
        Ok(())
    }
    fn output(&self) -> String {
        String::new()
    }
}

/// Walk the configuration tree once, creating/updating nodes and edges.
///
/// This is one "pass": afterwards the driver evaluates the graph, queries
/// the dirty set, performs actions, and finishes.
pub fn process_project(cfg: &ProjectConfig, store: &Store, walk: &mut Walk) -> Result<()> {
    let id = format!("prj:{}", cfg.name);
    debug!(id = %id, pass = walk.pass, "processing project");

    let seal = serde_json::to_string(&Seal {
        name: &cfg.name,
        vars: &cfg.vars,
    })?;

    let node = Arc::new(ProjectNode {
        id: id.clone(),
        life: Lifecycle::new(store.hash_of(&id)?),
    });
    node.life.process_state(walk.pass, &seal);
    store.add_ref(&id, node)?;

    let mut scope = Scope::root(compile_rules(&cfg.mappings)?);
    let ctx = NodeCtx {
        id: id.clone(),
        src_path: String::new(),
        dst_path: String::new(),
        vars: cfg.vars.clone(),
        copy_only: false,
    };

    process_children(
        &cfg.directories,
        &cfg.files,
        &cfg.execs,
        &ctx,
        &mut scope,
        store,
        walk,
    )?;

    let leftover = scope.resolve(|start, end| store.map_ref(start, end))?;
    if !leftover.is_empty() {
        debug!(
            count = leftover.len(),
            "mapping candidates left unresolved at project root"
        );
    }

    Ok(())
}
