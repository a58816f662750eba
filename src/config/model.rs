// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a meta file (JSON).
///
/// ```json
/// {
///   "name": "myproject",
///   "vars": {"author": "x"},
///   "mappings": [{"start": "exec:gen-*", "end": "file:*.out"}],
///   "directories": {
///     "app": {
///       "files": {"main.go.tmpl": {}},
///       "execs": {"fmt": {"cmd": ["gofmt", "-w", "."]}}
///     }
///   }
/// }
/// ```
///
/// Child maps are `BTreeMap` so traversal and serialization order are
/// deterministic.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project name; becomes the `prj:<name>` root node.
    pub name: String,

    /// Template variables inherited by the whole tree.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Mapping rules declared at project scope.
    #[serde(default)]
    pub mappings: Vec<RuleSpec>,

    #[serde(default)]
    pub directories: BTreeMap<String, DirectoryConfig>,

    #[serde(default)]
    pub files: BTreeMap<String, FileConfig>,

    #[serde(default)]
    pub execs: BTreeMap<String, ExecConfig>,
}

/// A directory of the source tree.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DirectoryConfig {
    /// Override for the source path segment.
    ///
    /// A value starting with `.` replaces the last segment relative to the
    /// parent's parent; a value starting with `/` is relative to the source
    /// root; anything else is appended to the derived path.
    #[serde(default, rename = "src-ovr")]
    pub src_override: Option<String>,

    /// Override for the destination path segment, same syntax as `src-ovr`.
    #[serde(default, rename = "dst-ovr")]
    pub dst_override: Option<String>,

    /// Merge `<source>/<dir-path>/meta.json` into this directory before
    /// traversal.
    #[serde(default)]
    pub import: bool,

    /// Default for files below: copy bytes instead of rendering templates.
    #[serde(default, rename = "copy-only")]
    pub copy_only: Option<bool>,

    /// Variables merged over the parent's for this subtree.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Mapping rules declared at this directory's scope.
    #[serde(default)]
    pub mappings: Vec<RuleSpec>,

    #[serde(default)]
    pub directories: BTreeMap<String, DirectoryConfig>,

    #[serde(default)]
    pub files: BTreeMap<String, FileConfig>,

    #[serde(default)]
    pub execs: BTreeMap<String, ExecConfig>,
}

/// A generated file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileConfig {
    /// Source path relative to the source root; derived from the directory
    /// path and file name when omitted.
    #[serde(default)]
    pub source: Option<String>,

    /// Copy bytes instead of rendering; falls back to the directory default.
    #[serde(default, rename = "copy-only")]
    pub copy_only: Option<bool>,

    /// Track the file in the graph without writing it out.
    #[serde(default, rename = "no-output")]
    pub no_output: bool,

    /// Variables merged over the inherited set for this file.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

/// An external command.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecConfig {
    /// Command and arguments, e.g. `["gofmt", "-w", "."]`.
    pub cmd: Vec<String>,

    /// Working directory relative to the source root.
    #[serde(default)]
    pub dir: Option<String>,

    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Kill-after deadline in milliseconds; defaults to 500.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// A declarative start/end mapping rule.
///
/// `start` and `end` are simple patterns over node identifiers: matching is
/// anchored, a literal `.` stays literal, `*` matches any run of
/// characters.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub start: String,
    pub end: String,

    /// Carried for compatibility with existing meta files; rules currently
    /// inherit without a depth limit.
    #[serde(default)]
    pub recurrence: i64,
}
