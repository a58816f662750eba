use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use metaforge::errors::Result;
use metaforge::store::{ActionContext, Actioner, GraphView};
use metaforge::track::{State, Tracker};

/// A minimal `Actioner` for store-level tests: a tracker plus a counter of
/// how often `perform` ran.
pub struct StubNode {
    id: String,
    tracker: Mutex<Tracker>,
    performed: AtomicUsize,
    fail_perform: bool,
}

impl StubNode {
    /// A node as the tree processor would hand it over on its first pass:
    /// fingerprinted from `content`, no prior hash.
    pub fn added(id: &str, pass: u64, content: &str) -> Arc<Self> {
        let mut tracker = Tracker::new();
        tracker.process_state(pass, content);
        Arc::new(Self {
            id: id.to_string(),
            tracker: Mutex::new(tracker),
            performed: AtomicUsize::new(0),
            fail_perform: false,
        })
    }

    /// A node revisited on a later pass, rehydrated with the hash the store
    /// recorded previously.
    pub fn revisited(id: &str, prior: &str, pass: u64, content: &str) -> Arc<Self> {
        let mut tracker = Tracker::with_prior(prior);
        tracker.process_state(pass, content);
        Arc::new(Self {
            id: id.to_string(),
            tracker: Mutex::new(tracker),
            performed: AtomicUsize::new(0),
            fail_perform: false,
        })
    }

    /// Like [`StubNode::added`], but `perform` fails.
    pub fn failing(id: &str, pass: u64, content: &str) -> Arc<Self> {
        let mut tracker = Tracker::new();
        tracker.process_state(pass, content);
        Arc::new(Self {
            id: id.to_string(),
            tracker: Mutex::new(tracker),
            performed: AtomicUsize::new(0),
            fail_perform: true,
        })
    }

    pub fn times_performed(&self) -> usize {
        self.performed.load(Ordering::SeqCst)
    }
}

impl Actioner for StubNode {
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
        self.performed.fetch_add(1, Ordering::SeqCst);
        if self.fail_perform {
            return Err(anyhow::anyhow!("stub action failed").into());
        }
        Ok(())
    }

    fn output(&self) -> String {
        if self.fail_perform {
            "stub action failed".to_string()
        } else {
            String::new()
        }
    }
}
