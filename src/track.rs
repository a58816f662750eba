// src/track.rs

//! Content fingerprinting and the per-node lifecycle state machine.
//!
//! A [`Tracker`] pairs a blake3 content hash with one of five lifecycle
//! states. The states mean:
//!
//! - `Stable`: quiescent since the last finish
//! - `Checked`: revisited this pass, fingerprint unchanged
//! - `Updated`: fingerprint changed, force-set, or inherited via propagation
//! - `Added`: first observation, no prior fingerprint
//! - `Remove`: marked for deletion because it was not revisited this pass
//!
//! The content handed to [`Tracker::process_state`] must exclude child
//! collections and parent back-references; otherwise every ancestor's hash
//! changes whenever any descendant does, defeating incremental detection.

use std::fmt;

/// Lifecycle state of a node, mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stable,
    Checked,
    Updated,
    Added,
    Remove,
}

impl State {
    /// Whether the node is part of the dirty set (needs its action performed).
    pub fn is_changed(self) -> bool {
        matches!(self, State::Updated | State::Added)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            State::Stable => "stable",
            State::Checked => "checked",
            State::Updated => "updated",
            State::Added => "added",
            State::Remove => "remove",
        };
        f.write_str(text)
    }
}

/// Change detection for a single node across passes.
#[derive(Debug, Clone)]
pub struct Tracker {
    hash: Option<String>,
    state: State,
    /// Pass in which `process_state` last ran; makes the per-pass
    /// idempotence guard explicit instead of overloading state values.
    processed_pass: Option<u64>,
}

impl Tracker {
    /// Tracker for a node observed for the first time.
    pub fn new() -> Self {
        Self {
            hash: None,
            state: State::Added,
            processed_pass: None,
        }
    }

    /// Tracker rehydrated with the hash a previous pass computed for the
    /// same identifier. The state is decided by the first `process_state`.
    pub fn with_prior(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            state: State::Stable,
            processed_pass: None,
        }
    }

    /// Hash and classify the node's serialized content for this pass.
    ///
    /// Idempotent within one pass: a second call with the same `pass` is a
    /// no-op, so structure visited twice in one traversal is not
    /// double-fingerprinted.
    pub fn process_state(&mut self, pass: u64, content: &str) {
        if self.processed_pass == Some(pass) {
            return;
        }
        self.processed_pass = Some(pass);

        let digest = blake3::hash(content.as_bytes()).to_hex().to_string();
        self.state = match &self.hash {
            None => State::Added,
            Some(prev) if *prev != digest => State::Updated,
            Some(_) => State::Checked,
        };
        self.hash = Some(digest);
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Current hash, empty if nothing has been fingerprinted yet.
    pub fn hash(&self) -> String {
        self.hash.clone().unwrap_or_default()
    }

    pub fn flag_state(&mut self) {
        self.state = State::Updated;
    }

    pub fn clear_state(&mut self) {
        self.state = State::Stable;
    }

    pub fn remove_state(&mut self) {
        self.state = State::Remove;
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
