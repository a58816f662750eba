// src/entity/directory.rs

//! Directory nodes: scope carriers of the tree.
//!
//! A directory derives its source/destination paths from its parent (plus
//! optional overrides), opens a child mapping scope, and recurses. With
//! `import` set, children from `<source>/<dir-path>/meta.json` are merged in
//! before traversal.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use tracing::debug;

use crate::config::DirectoryConfig;
use crate::entity::{
    Lifecycle, NodeCtx, Walk, join_path, modify_path, process_children,
};
use crate::errors::Result;
use crate::mapping::{Candidate, Scope, compile_rules};
use crate::store::{ActionContext, Actioner, GraphView, Store};
use crate::track::State;

pub struct DirNode {
    id: String,
    life: Lifecycle,
}

#[derive(Serialize)]
struct Seal<'a> {
    name: &'a str,
    src_path: &'a str,
    dst_path: &'a str,
    copy_only: bool,
    vars: &'a BTreeMap<String, String>,
}

impl Actioner for DirNode {
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

/// Process one directory: create its node, link it under its parent,
/// traverse its children in a child scope, and resolve the rules declared
/// on it. Returns the directory's identifier and the candidates that must
/// bubble to the parent scope.
pub(crate) fn process(
    name: &str,
    cfg: &DirectoryConfig,
    parent: &NodeCtx,
    parent_scope: &Scope,
    store: &Store,
    walk: &mut Walk,
) -> Result<(String, Vec<Candidate>)> {
    let src_path = modify_path(
        &join_path(&parent.src_path, name),
        cfg.src_override.as_deref(),
    );
    let dst_path = modify_path(
        &join_path(&parent.dst_path, name),
        cfg.dst_override.as_deref(),
    );
    let id = format!("dir:{src_path}");
    walk.visit(&id)?;
    debug!(id = %id, "processing directory");

    let cfg = merge_import(cfg, &src_path, walk)?;
    let copy_only = cfg.copy_only.unwrap_or(parent.copy_only);

    let seal = serde_json::to_string(&Seal {
        name,
        src_path: &src_path,
        dst_path: &dst_path,
        copy_only,
        vars: &cfg.vars,
    })?;

    let node = Arc::new(DirNode {
        id: id.clone(),
        life: Lifecycle::new(store.hash_of(&id)?),
    });
    node.life.process_state(walk.pass, &seal);
    store.add_ref(&id, node)?;
    store.map_ref(&parent.id, &id)?;

    let mut vars = parent.vars.clone();
    vars.extend(cfg.vars.clone());

    let ctx = NodeCtx {
        id: id.clone(),
        src_path,
        dst_path,
        vars,
        copy_only,
    };

    let mut scope = Scope::child(parent_scope, compile_rules(&cfg.mappings)?);
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
    Ok((id, leftover))
}

/// Merge imported children into a copy of the directory configuration.
fn merge_import(
    cfg: &DirectoryConfig,
    src_path: &str,
    walk: &Walk,
) -> Result<DirectoryConfig> {
    let mut merged = cfg.clone();
    if !cfg.import {
        return Ok(merged);
    }

    let meta = walk.source_root.join(src_path).join("meta.json");
    debug!(?meta, "importing directory children");
    let text = fs::read_to_string(&meta)
        .with_context(|| format!("reading imported meta file {meta:?}"))?;
    let imported: DirectoryConfig = serde_json::from_str(&text)?;

    merged.directories.extend(imported.directories);
    merged.files.extend(imported.files);
    merged.execs.extend(imported.execs);
    Ok(merged)
}
