// src/entity/file.rs

//! File nodes: template rendering into the destination tree.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use tracing::debug;

use crate::config::FileConfig;
use crate::entity::{Lifecycle, NodeCtx, Walk, join_path, render};
use crate::errors::Result;
use crate::store::{ActionContext, Actioner, GraphView, Store};
use crate::track::State;

pub struct FileNode {
    id: String,
    /// Source path relative to the source root.
    source: String,
    /// Destination path relative to the dest root (`.tmpl` stripped).
    dest: String,
    /// Variables merged down from all ancestors plus the file's own.
    vars: BTreeMap<String, String>,
    copy_only: bool,
    no_output: bool,
    life: Lifecycle,
}

#[derive(Serialize)]
struct Seal<'a> {
    name: &'a str,
    source: &'a str,
    copy_only: bool,
    no_output: bool,
    vars: &'a BTreeMap<String, String>,
}

impl Actioner for FileNode {
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

    /// Render (or copy) the source into the destination tree.
    ///
    /// Template rendering first collects `{{define name}}` snippets from the
    /// ancestor chain (`parent_files`, ancestor-first, so nearer definitions
    /// override farther ones), then substitutes `{{name}}` placeholders from
    /// snippets and variables.
    fn perform(&self, view: &dyn GraphView, ctx: &ActionContext) -> Result<()> {
        if self.no_output {
            debug!(id = %self.id, "no-output file; skipping write");
            return Ok(());
        }

        let src = ctx.source_root.join(&self.source);
        let dst = ctx.dest_root.join(&self.dest);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {parent:?}"))?;
        }

        if self.copy_only {
            debug!(id = %self.id, ?dst, "copying");
            fs::copy(&src, &dst)
                .with_context(|| format!("copying {src:?} to {dst:?}"))?;
            return Ok(());
        }

        debug!(id = %self.id, ?dst, "rendering");
        let mut snippets = BTreeMap::new();
        for parent_id in view.parent_files(&self.id)? {
            let rel = parent_id.trim_start_matches("file:");
            let path = ctx.source_root.join(rel);
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading ancestor template {path:?}"))?;
            render::collect_snippets(&content, &mut snippets);
        }

        let own = fs::read_to_string(&src)
            .with_context(|| format!("reading template {src:?}"))?;
        let body = render::collect_snippets(&own, &mut snippets);
        let rendered = render::substitute(&body, &snippets, &self.vars);

        fs::write(&dst, rendered)
            .with_context(|| format!("writing {dst:?}"))?;
        Ok(())
    }

    fn output(&self) -> String {
        String::new()
    }
}

/// Process one file entry: derive its source path, fingerprint it, store it
/// and link it under its parent. Returns the node identifier so the caller
/// can offer it to the enclosing mapping scope.
pub(crate) fn process(
    name: &str,
    cfg: &FileConfig,
    parent: &NodeCtx,
    store: &Store,
    walk: &mut Walk,
) -> Result<String> {
    let source = match &cfg.source {
        Some(source) if !source.is_empty() => source.clone(),
        _ => join_path(&parent.src_path, name),
    };
    let id = format!("file:{source}");

    let dest_name = name.strip_suffix(".tmpl").unwrap_or(name);
    let dest = join_path(&parent.dst_path, dest_name);

    let seal = serde_json::to_string(&Seal {
        name,
        source: &source,
        copy_only: cfg.copy_only.unwrap_or(parent.copy_only),
        no_output: cfg.no_output,
        vars: &cfg.vars,
    })?;

    let mut vars = parent.vars.clone();
    vars.extend(cfg.vars.clone());

    let node = Arc::new(FileNode {
        id: id.clone(),
        source,
        dest,
        vars,
        copy_only: cfg.copy_only.unwrap_or(parent.copy_only),
        no_output: cfg.no_output,
        life: Lifecycle::new(store.hash_of(&id)?),
    });
    node.life.process_state(walk.pass, &seal);
    store.add_ref(&id, node)?;
    store.map_ref(&parent.id, &id)?;

    Ok(id)
}
