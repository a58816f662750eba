// src/entity/exec.rs

//! Exec nodes: external commands run as node actions.

use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use serde::Serialize;
use tracing::debug;

use crate::config::ExecConfig;
use crate::entity::{Lifecycle, NodeCtx, Walk};
use crate::errors::{MetaforgeError, Result};
use crate::store::{ActionContext, Actioner, GraphView, Store};
use crate::track::State;

const DEFAULT_TIMEOUT_MS: u64 = 500;

pub struct ExecNode {
    id: String,
    name: String,
    cmd: Vec<String>,
    dir: Option<String>,
    env: BTreeMap<String, String>,
    timeout_ms: u64,
    captured: Mutex<Captured>,
    life: Lifecycle,
}

#[derive(Default)]
struct Captured {
    stdout: String,
    stderr: String,
}

#[derive(Serialize)]
struct Seal<'a> {
    name: &'a str,
    cmd: &'a [String],
    dir: &'a Option<String>,
    env: &'a BTreeMap<String, String>,
    timeout_ms: u64,
}

impl Actioner for ExecNode {
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

    /// Run the command on the caller's thread, killing it once the deadline
    /// passes. Stdout/stderr are captured for `output()`.
    fn perform(&self, _view: &dyn GraphView, ctx: &ActionContext) -> Result<()> {
        let dir = match &self.dir {
            Some(dir) => ctx.source_root.join(dir),
            None => ctx.source_root.clone(),
        };
        debug!(id = %self.id, ?dir, "running command");

        let mut child = Command::new(&self.cmd[0])
            .args(&self.cmd[1..])
            .current_dir(&dir)
            .envs(&self.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning command '{}'", self.cmd[0]))?;

        let deadline = Duration::from_millis(self.timeout_ms);
        let started = Instant::now();
        let mut timed_out = false;
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if started.elapsed() > deadline {
                let _ = child.kill();
                timed_out = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let out = child.wait_with_output()?;
        {
            let mut captured = self.captured.lock().expect("capture lock");
            captured.stdout = String::from_utf8_lossy(&out.stdout).into_owned();
            captured.stderr = String::from_utf8_lossy(&out.stderr).into_owned();
        }

        if timed_out {
            return Err(MetaforgeError::ExecTimeout {
                name: self.name.clone(),
                ms: self.timeout_ms,
            });
        }
        if !out.status.success() {
            return Err(MetaforgeError::ExecFailed {
                name: self.name.clone(),
                code: out.status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }

    fn output(&self) -> String {
        let captured = self.captured.lock().expect("capture lock");
        let mut output = format!("action {} was run", self.name);
        if !captured.stdout.is_empty() {
            output.push_str("\nstdout: ");
            output.push_str(&captured.stdout);
        }
        if !captured.stderr.is_empty() {
            output.push_str("\nstderr: ");
            output.push_str(&captured.stderr);
        }
        output
    }
}

/// Process one exec entry. Returns the node identifier so the caller can
/// offer it to the enclosing mapping scope.
pub(crate) fn process(
    name: &str,
    cfg: &ExecConfig,
    parent: &NodeCtx,
    store: &Store,
    walk: &mut Walk,
) -> Result<String> {
    let id = format!("exec:{name}");
    let timeout_ms = cfg.timeout.unwrap_or(DEFAULT_TIMEOUT_MS);

    let seal = serde_json::to_string(&Seal {
        name,
        cmd: &cfg.cmd,
        dir: &cfg.dir,
        env: &cfg.env,
        timeout_ms,
    })?;

    let node = Arc::new(ExecNode {
        id: id.clone(),
        name: name.to_string(),
        cmd: cfg.cmd.clone(),
        dir: cfg.dir.clone(),
        env: cfg.env.clone(),
        timeout_ms,
        captured: Mutex::new(Captured::default()),
        life: Lifecycle::new(store.hash_of(&id)?),
    });
    node.life.process_state(walk.pass, &seal);
    store.add_ref(&id, node)?;
    store.map_ref(&parent.id, &id)?;

    Ok(id)
}
