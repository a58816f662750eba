// src/lib.rs

pub mod cli;
pub mod config;
pub mod entity;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod mapping;
pub mod store;
pub mod track;
pub mod watch;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, PassArgs};
use crate::config::{ProjectConfig, load_and_validate};
use crate::entity::{Walk, process_project};
use crate::errors::MetaforgeError;
use crate::store::{ActionContext, GraphView, Store};
use crate::watch::WatchEvent;

/// Quiet period after the last filesystem event before a rebuild pass runs.
const DEBOUNCE_MS: u64 = 400;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Build(opts) => run_build(opts).await,
        Command::Watch(opts) => run_watch(opts).await,
    }
}

/// Once-off build: one pass, then exit.
pub async fn run_build(opts: PassArgs) -> Result<()> {
    let ctx = action_context(&opts);
    let cfg = load_and_validate(Path::new(&opts.metafile))?;
    let store = Store::start();

    let pass_store = store.clone();
    let pass_ctx = ctx.clone();
    tokio::task::spawn_blocking(move || build_pass(&pass_store, &cfg, 1, &pass_ctx))
        .await??;

    info!("build finished");
    Ok(())
}

/// Build once, then keep rebuilding as the meta file and sources change.
pub async fn run_watch(opts: PassArgs) -> Result<()> {
    let ctx = action_context(&opts);
    let meta_path = PathBuf::from(&opts.metafile);
    let store = Store::start();

    let cfg = load_and_validate(&meta_path)?;
    {
        let pass_store = store.clone();
        let pass_ctx = ctx.clone();
        tokio::task::spawn_blocking(move || build_pass(&pass_store, &cfg, 1, &pass_ctx))
            .await??;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<WatchEvent>();
    let _watcher = watch::spawn_watcher(&ctx.source_root, &meta_path, tx)?;

    let mut pass: u64 = 1;
    let mut meta_changed = false;
    let mut dirty: BTreeSet<String> = BTreeSet::new();

    info!("watching for changes (ctrl-c to stop)");
    loop {
        let pending = meta_changed || !dirty.is_empty();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                break;
            }
            event = rx.recv() => match event {
                Some(WatchEvent::Meta) => meta_changed = true,
                Some(WatchEvent::Source(rel)) => {
                    dirty.insert(rel);
                }
                None => {
                    info!("watch channel closed; stopping");
                    break;
                }
            },
            _ = tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)), if pending => {
                pass += 1;
                let reload_meta = meta_changed;
                let touched: Vec<String> = dirty.iter().cloned().collect();
                meta_changed = false;
                dirty.clear();

                let pass_store = store.clone();
                let pass_ctx = ctx.clone();
                let pass_meta = meta_path.clone();
                let result = tokio::task::spawn_blocking(move || {
                    watch_pass(&pass_store, &pass_meta, reload_meta, &touched, pass, &pass_ctx)
                })
                .await?;

                if let Err(err) = result {
                    // Finish was not reached, so the previous pass's
                    // committed state is retained.
                    warn!(%err, "rebuild pass failed; keeping previous state");
                }
            }
        }
    }

    Ok(())
}

fn action_context(opts: &PassArgs) -> ActionContext {
    ActionContext {
        source_root: PathBuf::from(&opts.source),
        dest_root: PathBuf::from(&opts.destination),
        force: opts.force,
    }
}

/// One full build pass: walk the tree, evaluate, perform the dirty set in
/// dependency order, commit.
fn build_pass(
    store: &Store,
    cfg: &ProjectConfig,
    pass: u64,
    ctx: &ActionContext,
) -> errors::Result<()> {
    let mut walk = Walk::new(pass, &ctx.source_root);
    process_project(cfg, store, &mut walk)?;
    store.evaluate()?;

    if ctx.force {
        for node in GraphView::nodes(store, Some("file:"), false)? {
            store.set_update(&node.identifier())?;
        }
    }

    perform_changed(store, ctx)?;
    store.finish()?;
    Ok(())
}

/// One rebuild pass in watch mode.
///
/// The tree is re-walked *before* queued filesystem updates are applied, so
/// a forced flag cannot be lost to an `add_ref` overwrite in the same
/// debounce window.
fn watch_pass(
    store: &Store,
    meta_path: &Path,
    meta_changed: bool,
    touched: &[String],
    pass: u64,
    ctx: &ActionContext,
) -> errors::Result<()> {
    if meta_changed {
        info!("meta file changed; re-processing configuration");
        let cfg = load_and_validate(meta_path)?;
        let mut walk = Walk::new(pass, &ctx.source_root);
        process_project(&cfg, store, &mut walk)?;
    }

    store.evaluate()?;
    if meta_changed {
        store.assess()?;
    }

    for rel in touched {
        let id = format!("file:{rel}");
        match store.set_update(&id) {
            Ok(()) => debug!(id = %id, "flagged updated from filesystem"),
            Err(MetaforgeError::RefNotFound(_)) => {
                debug!(id = %id, "changed path is not a tracked file");
            }
            Err(err) => return Err(err),
        }
    }

    store.propagate()?;
    perform_changed(store, ctx)?;
    store.finish()?;
    Ok(())
}

/// Perform every dirty node in dependency order on this thread.
///
/// A failing action is reported with the node's output and does not abort
/// sibling processing.
fn perform_changed(store: &Store, ctx: &ActionContext) -> errors::Result<()> {
    let changed = store.changed_refs()?;
    info!(count = changed.len(), "performing changed nodes");

    for node in changed {
        let id = node.identifier();
        debug!(id = %id, state = %node.state(), "performing");
        if let Err(err) = node.perform(store, ctx) {
            warn!(id = %id, %err, "node action failed");
        }
        let output = node.output();
        if !output.is_empty() {
            info!(id = %id, %output);
        }
    }
    Ok(())
}
