// src/errors.rs

//! Crate-wide error taxonomy and `Result` alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaforgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid mapping pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Cycle detected in graph: {0}")]
    DagCycle(String),

    #[error("Reference not found: {0}")]
    RefNotFound(String),

    #[error("Reference already exists: {0}")]
    RefExists(String),

    #[error("'{id}' matches both start and end of mapping rule '{rule}'")]
    MappingConflict { id: String, rule: String },

    #[error("Traversal revisited '{0}'; the configuration tree contains a cycle")]
    TraversalCycle(String),

    #[error("Graph not evaluated; call evaluate() before ordered queries")]
    NotEvaluated,

    #[error("Graph store is no longer running")]
    StoreClosed,

    #[error("Command '{name}' exited with status {code}")]
    ExecFailed { name: String, code: i32 },

    #[error("Command '{name}' timed out after {ms}ms")]
    ExecTimeout { name: String, ms: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MetaforgeError>;
