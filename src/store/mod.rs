// src/store/mod.rs

//! The graph store: single authority over the node table and the DAG.
//!
//! All state lives on one dedicated thread; every mutation and query is a
//! synchronous request/response message over an mpsc channel, so callers
//! never hold a lock and mutation is strictly linearized. Requests from one
//! caller are observed in issuance order; independent callers (tree
//! traversal, watcher callbacks, the build driver) serialize into one total
//! order.
//!
//! Node actions (`perform`) run on the *caller's* thread, never on the store
//! loop, so a slow external command cannot stall other callers' graph
//! operations.
//!
//! The semantics live in [`core::StoreCore`]; this module is the channel
//! shell around it.

pub mod core;

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use tracing::debug;

use crate::errors::{MetaforgeError, Result};
use crate::track::State;

use self::core::StoreCore;

/// Capability contract a node value must satisfy to be stored.
///
/// Lifecycle mutators take `&self`: implementations keep their tracker
/// behind interior mutability so the store and performing callers can share
/// one `Arc`.
pub trait Actioner: Send + Sync {
    fn identifier(&self) -> String;
    fn hash(&self) -> String;
    fn state(&self) -> State;
    fn flag_state(&self);
    fn clear_state(&self);
    fn remove_state(&self);
    fn perform(&self, view: &dyn GraphView, ctx: &ActionContext) -> Result<()>;
    fn output(&self) -> String;
}

/// Read-only projection of the store passed into `perform`, letting a node
/// discover its ancestor chain without access to mutation operations.
pub trait GraphView {
    fn parent_files(&self, id: &str) -> Result<Vec<String>>;
    fn nodes(&self, selection: Option<&str>, changed_only: bool)
    -> Result<Vec<Arc<dyn Actioner>>>;
}

/// Context handed to node actions by the drivers.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Root of the source (meta work) tree.
    pub source_root: std::path::PathBuf,
    /// Root of the generated output tree.
    pub dest_root: std::path::PathBuf,
    /// Rebuild files even when their fingerprints did not change.
    pub force: bool,
}

enum Request {
    Add {
        id: String,
        node: Arc<dyn Actioner>,
        reply: mpsc::Sender<()>,
    },
    Rename {
        old: String,
        new: String,
        reply: mpsc::Sender<Result<()>>,
    },
    Map {
        start: String,
        end: String,
        priority: u32,
        reply: mpsc::Sender<()>,
    },
    SetUpdate {
        id: String,
        reply: mpsc::Sender<Result<()>>,
    },
    Evaluate {
        reply: mpsc::Sender<Result<()>>,
    },
    Assess {
        reply: mpsc::Sender<()>,
    },
    Propagate {
        reply: mpsc::Sender<()>,
    },
    Finish {
        reply: mpsc::Sender<()>,
    },
    Nodes {
        selection: Option<String>,
        changed_only: bool,
        reply: mpsc::Sender<Result<Vec<Arc<dyn Actioner>>>>,
    },
    ParentFiles {
        id: String,
        reply: mpsc::Sender<Result<Vec<String>>>,
    },
    HashOf {
        id: String,
        reply: mpsc::Sender<Option<String>>,
    },
    ExportDot {
        reply: mpsc::Sender<String>,
    },
}

/// Cloneable handle to the store's control loop.
///
/// Every method is a blocking round-trip; the loop itself only performs
/// in-memory work, so round-trips are fast and bounded by graph size.
#[derive(Clone)]
pub struct Store {
    tx: mpsc::Sender<Request>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Spawn the control loop and return a handle to it.
    ///
    /// The loop exits when the last handle is dropped.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel::<Request>();

        thread::Builder::new()
            .name("metaforge-store".to_string())
            .spawn(move || {
                let mut core = StoreCore::new();
                while let Ok(request) = rx.recv() {
                    Self::handle(&mut core, request);
                }
                debug!("store control loop finished");
            })
            .expect("spawning store thread");

        Self { tx }
    }

    fn handle(core: &mut StoreCore, request: Request) {
        // A dropped reply receiver means the caller gave up; nothing to do.
        match request {
            Request::Add { id, node, reply } => {
                core.add_ref(&id, node);
                let _ = reply.send(());
            }
            Request::Rename { old, new, reply } => {
                let _ = reply.send(core.rename_ref(&old, &new));
            }
            Request::Map {
                start,
                end,
                priority,
                reply,
            } => {
                core.map_ref(&start, &end, priority);
                let _ = reply.send(());
            }
            Request::SetUpdate { id, reply } => {
                let _ = reply.send(core.set_update(&id));
            }
            Request::Evaluate { reply } => {
                let _ = reply.send(core.evaluate());
            }
            Request::Assess { reply } => {
                core.assess();
                let _ = reply.send(());
            }
            Request::Propagate { reply } => {
                core.propagate();
                let _ = reply.send(());
            }
            Request::Finish { reply } => {
                core.finish();
                let _ = reply.send(());
            }
            Request::Nodes {
                selection,
                changed_only,
                reply,
            } => {
                let _ = reply.send(core.nodes(selection.as_deref(), changed_only));
            }
            Request::ParentFiles { id, reply } => {
                let _ = reply.send(core.parent_files(&id));
            }
            Request::HashOf { id, reply } => {
                let _ = reply.send(core.hash_of(&id));
            }
            Request::ExportDot { reply } => {
                let _ = reply.send(core.export_dot());
            }
        }
    }

    fn round_trip<T>(
        &self,
        make: impl FnOnce(mpsc::Sender<T>) -> Request,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| MetaforgeError::StoreClosed)?;
        reply_rx.recv().map_err(|_| MetaforgeError::StoreClosed)
    }

    /// Insert or update a node. See [`StoreCore::add_ref`].
    pub fn add_ref(&self, id: &str, node: Arc<dyn Actioner>) -> Result<()> {
        self.round_trip(|reply| Request::Add {
            id: id.to_string(),
            node,
            reply,
        })
    }

    /// Relocate a node and its incident edges to a new key.
    pub fn rename_ref(&self, old: &str, new: &str) -> Result<()> {
        self.round_trip(|reply| Request::Rename {
            old: old.to_string(),
            new: new.to_string(),
            reply,
        })?
    }

    /// Idempotent edge `start -> end` with the default priority.
    pub fn map_ref(&self, start: &str, end: &str) -> Result<()> {
        self.map_ref_with(start, end, 1)
    }

    /// Idempotent edge `start -> end` with an explicit priority.
    pub fn map_ref_with(&self, start: &str, end: &str, priority: u32) -> Result<()> {
        self.round_trip(|reply| Request::Map {
            start: start.to_string(),
            end: end.to_string(),
            priority,
            reply,
        })
    }

    /// Force a node dirty, independent of configuration fingerprinting.
    pub fn set_update(&self, id: &str) -> Result<()> {
        self.round_trip(|reply| Request::SetUpdate {
            id: id.to_string(),
            reply,
        })?
    }

    /// Compile the DAG; must run once per pass before ordered queries.
    pub fn evaluate(&self) -> Result<()> {
        self.round_trip(|reply| Request::Evaluate { reply })?
    }

    /// Mark nodes not revisited this pass for removal.
    pub fn assess(&self) -> Result<()> {
        self.round_trip(|reply| Request::Assess { reply })
    }

    /// Push dirtiness forward along edges.
    pub fn propagate(&self) -> Result<()> {
        self.round_trip(|reply| Request::Propagate { reply })
    }

    /// Commit the pass; deletes `Remove`-flagged nodes.
    pub fn finish(&self) -> Result<()> {
        self.round_trip(|reply| Request::Finish { reply })
    }

    /// All dirty nodes in dependency order.
    pub fn changed_refs(&self) -> Result<Vec<Arc<dyn Actioner>>> {
        GraphView::nodes(self, None, true)
    }

    /// Dirty `file:` nodes in dependency order.
    pub fn changed_files(&self) -> Result<Vec<Arc<dyn Actioner>>> {
        GraphView::nodes(self, Some("file:"), true)
    }

    /// Dirty `exec:` nodes in dependency order.
    pub fn changed_execs(&self) -> Result<Vec<Arc<dyn Actioner>>> {
        GraphView::nodes(self, Some("exec:"), true)
    }

    /// Hash recorded for `id` by a previous pass, if any.
    pub fn hash_of(&self, id: &str) -> Result<Option<String>> {
        self.round_trip(|reply| Request::HashOf {
            id: id.to_string(),
            reply,
        })
    }

    /// Graphviz rendering of the live graph.
    pub fn export_dot(&self) -> Result<String> {
        self.round_trip(|reply| Request::ExportDot { reply })
    }
}

impl GraphView for Store {
    fn parent_files(&self, id: &str) -> Result<Vec<String>> {
        self.round_trip(|reply| Request::ParentFiles {
            id: id.to_string(),
            reply,
        })?
    }

    fn nodes(
        &self,
        selection: Option<&str>,
        changed_only: bool,
    ) -> Result<Vec<Arc<dyn Actioner>>> {
        self.round_trip(|reply| Request::Nodes {
            selection: selection.map(|s| s.to_string()),
            changed_only,
            reply,
        })?
    }
}
