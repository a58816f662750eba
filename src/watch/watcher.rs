// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;

/// Event forwarded into the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The meta file itself changed: the tree must be re-processed.
    Meta,
    /// A source file changed, identified by its path relative to the source
    /// root (forward slashes), matching the `file:<path>` identifier scheme.
    Source(String),
}

/// Keeps the underlying `RecommendedWatcher` alive; dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch the source root (recursively) and the meta file, forwarding
/// classified events into the async watch loop.
pub fn spawn_watcher(
    source_root: impl Into<PathBuf>,
    meta_path: impl Into<PathBuf>,
    tx: mpsc::UnboundedSender<WatchEvent>,
) -> Result<WatcherHandle> {
    let source_root: PathBuf = source_root.into();
    let source_root = source_root
        .canonicalize()
        .unwrap_or_else(|_| source_root.clone());
    let meta_path: PathBuf = meta_path.into();
    let meta_path = meta_path.canonicalize().unwrap_or_else(|_| meta_path.clone());

    // Closure called synchronously by notify whenever an event arrives.
    let callback_root = source_root.clone();
    let callback_meta = meta_path.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                for path in &event.paths {
                    if let Some(ev) = classify(path, &callback_root, &callback_meta) {
                        if tx.send(ev).is_err() {
                            // Watch loop is gone; nothing left to notify.
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                eprintln!("metaforge: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&source_root, RecursiveMode::Recursive)
        .with_context(|| format!("watching source root {source_root:?}"))?;
    watcher
        .watch(&meta_path, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching meta file {meta_path:?}"))?;

    info!(?source_root, ?meta_path, "file watcher started");
    Ok(WatcherHandle { _inner: watcher })
}

fn classify(path: &Path, source_root: &Path, meta_path: &Path) -> Option<WatchEvent> {
    if path == meta_path {
        return Some(WatchEvent::Meta);
    }
    match path.strip_prefix(source_root) {
        Ok(rel) => {
            let rel = rel.to_string_lossy().replace('\\', "/");
            debug!(rel = %rel, "source change observed");
            Some(WatchEvent::Source(rel))
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_splits_meta_and_source() {
        let root = Path::new("/work");
        let meta = Path::new("/meta.json");

        assert_eq!(classify(meta, root, meta), Some(WatchEvent::Meta));
        assert_eq!(
            classify(Path::new("/work/app/main.go"), root, meta),
            Some(WatchEvent::Source("app/main.go".to_string()))
        );
        assert_eq!(classify(Path::new("/elsewhere/x"), root, meta), None);
    }
}
