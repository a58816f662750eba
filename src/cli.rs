// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `metaforge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "metaforge",
    version,
    about = "Generate and incrementally rebuild projects from a meta configuration.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `METAFORGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Do a once-off build of the project and return.
    Build(PassArgs),

    /// Build, then watch the meta file and sources and rebuild on change.
    Watch(PassArgs),
}

/// Options shared by `build` and `watch`.
#[derive(Debug, Clone, Args)]
pub struct PassArgs {
    /// The meta file describing the project.
    #[arg(long, value_name = "PATH", default_value = "meta.json")]
    pub metafile: String,

    /// The source (meta work) directory templates are read from.
    #[arg(long, short, value_name = "DIR", default_value = "work")]
    pub source: String,

    /// The destination directory generated files are written to.
    #[arg(long, short, value_name = "DIR", default_value = ".")]
    pub destination: String,

    /// Force rebuilding of files whose fingerprints did not change.
    #[arg(long, short)]
    pub force: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
