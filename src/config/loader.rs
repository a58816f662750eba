// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{DirectoryConfig, ExecConfig, ProjectConfig, RuleSpec};
use crate::errors::{MetaforgeError, Result};
use crate::mapping;

/// Load a meta file from disk and run semantic validation.
pub fn load_and_validate(path: &Path) -> Result<ProjectConfig> {
    debug!(?path, "loading meta file");
    let text = fs::read_to_string(path)?;
    let cfg: ProjectConfig = serde_json::from_str(&text)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Semantic validation beyond what serde enforces:
///
/// - the project name is nonempty
/// - every mapping rule compiles
/// - every exec has a command
pub fn validate(cfg: &ProjectConfig) -> Result<()> {
    if cfg.name.trim().is_empty() {
        return Err(MetaforgeError::ConfigError(
            "project name must not be empty".to_string(),
        ));
    }

    validate_rules(&cfg.mappings, "project")?;
    validate_execs(&cfg.execs, "project")?;

    for (name, dir) in &cfg.directories {
        validate_directory(name, dir)?;
    }
    Ok(())
}

fn validate_directory(name: &str, dir: &DirectoryConfig) -> Result<()> {
    validate_rules(&dir.mappings, name)?;
    validate_execs(&dir.execs, name)?;
    for (child_name, child) in &dir.directories {
        validate_directory(child_name, child)?;
    }
    Ok(())
}

fn validate_rules(specs: &[RuleSpec], owner: &str) -> Result<()> {
    for spec in specs {
        mapping::Rule::compile(spec).map_err(|err| {
            MetaforgeError::ConfigError(format!(
                "invalid mapping rule on '{owner}' ({} > {}): {err}",
                spec.start, spec.end
            ))
        })?;
    }
    Ok(())
}

fn validate_execs(
    execs: &std::collections::BTreeMap<String, ExecConfig>,
    owner: &str,
) -> Result<()> {
    for (name, exec) in execs {
        if exec.cmd.is_empty() {
            return Err(MetaforgeError::ConfigError(format!(
                "exec '{name}' on '{owner}' has an empty command"
            )));
        }
    }
    Ok(())
}
