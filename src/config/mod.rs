// src/config/mod.rs

//! Configuration loading and validation for the meta file.

pub mod loader;
pub mod model;

pub use loader::load_and_validate;
pub use model::{DirectoryConfig, ExecConfig, FileConfig, ProjectConfig, RuleSpec};
