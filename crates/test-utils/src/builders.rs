#![allow(dead_code)]

use std::collections::BTreeMap;

use metaforge::config::{
    DirectoryConfig, ExecConfig, FileConfig, ProjectConfig, RuleSpec,
};

/// Builder for `ProjectConfig` to simplify test setup.
pub struct ProjectConfigBuilder {
    config: ProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            config: ProjectConfig {
                name: name.to_string(),
                vars: BTreeMap::new(),
                mappings: Vec::new(),
                directories: BTreeMap::new(),
                files: BTreeMap::new(),
                execs: BTreeMap::new(),
            },
        }
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.config.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_mapping(mut self, start: &str, end: &str) -> Self {
        self.config.mappings.push(RuleSpec {
            start: start.to_string(),
            end: end.to_string(),
            recurrence: 0,
        });
        self
    }

    pub fn with_directory(mut self, name: &str, dir: DirectoryConfig) -> Self {
        self.config.directories.insert(name.to_string(), dir);
        self
    }

    pub fn with_file(mut self, name: &str, file: FileConfig) -> Self {
        self.config.files.insert(name.to_string(), file);
        self
    }

    pub fn with_exec(mut self, name: &str, exec: ExecConfig) -> Self {
        self.config.execs.insert(name.to_string(), exec);
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.config
    }
}

/// Builder for `DirectoryConfig`.
#[derive(Default)]
pub struct DirectoryConfigBuilder {
    dir: DirectoryConfig,
}

impl DirectoryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.dir.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_mapping(mut self, start: &str, end: &str) -> Self {
        self.dir.mappings.push(RuleSpec {
            start: start.to_string(),
            end: end.to_string(),
            recurrence: 0,
        });
        self
    }

    pub fn copy_only(mut self, value: bool) -> Self {
        self.dir.copy_only = Some(value);
        self
    }

    pub fn import(mut self, value: bool) -> Self {
        self.dir.import = value;
        self
    }

    pub fn src_override(mut self, value: &str) -> Self {
        self.dir.src_override = Some(value.to_string());
        self
    }

    pub fn with_directory(mut self, name: &str, dir: DirectoryConfig) -> Self {
        self.dir.directories.insert(name.to_string(), dir);
        self
    }

    pub fn with_file(mut self, name: &str, file: FileConfig) -> Self {
        self.dir.files.insert(name.to_string(), file);
        self
    }

    pub fn with_exec(mut self, name: &str, exec: ExecConfig) -> Self {
        self.dir.execs.insert(name.to_string(), exec);
        self
    }

    pub fn build(self) -> DirectoryConfig {
        self.dir
    }
}

/// Builder for `FileConfig`.
#[derive(Default)]
pub struct FileConfigBuilder {
    file: FileConfig,
}

impl FileConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, value: &str) -> Self {
        self.file.source = Some(value.to_string());
        self
    }

    pub fn copy_only(mut self, value: bool) -> Self {
        self.file.copy_only = Some(value);
        self
    }

    pub fn no_output(mut self, value: bool) -> Self {
        self.file.no_output = value;
        self
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.file.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> FileConfig {
        self.file
    }
}

/// Shorthand for an `ExecConfig` running the given command line.
pub fn exec_config(cmd: &[&str]) -> ExecConfig {
    ExecConfig {
        cmd: cmd.iter().map(|s| s.to_string()).collect(),
        dir: None,
        env: BTreeMap::new(),
        timeout: None,
    }
}
