//! CLI command definitions for mcp-config-resolver
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.
//! [`ConfigArgs`] is also meant to be flattened into other applications'
//! CLIs so their users get the same discovery switches.

pub mod check_path;
pub mod discover;
pub mod env;
pub mod init;
pub mod resolve;

use crate::discovery::HierarchicalMode;
use crate::schema::{ConfigSchema, Schema};
use anyhow::{Context, Result};
use check_path::CheckPathArgs;
use clap::{Args, Parser, Subcommand, ValueEnum};
use discover::DiscoverArgs;
use env::EnvArgs;
use init::InitArgs;
use resolve::ResolveArgs;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolve application configuration from inline data, files and the environment
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Schema file (YAML or JSON) describing the configuration shape
    #[arg(short, long, global = true, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve configuration and print it with its source
    Resolve(ResolveArgs),

    /// Show which config files hierarchical discovery finds
    Discover(DiscoverArgs),

    /// List the environment variable for each schema field
    Env(EnvArgs),

    /// Run the security boundary checks on a path
    CheckPath(CheckPathArgs),

    /// Create a config file from the schema defaults
    Init(InitArgs),
}

/// Discovery switches shared by commands and embeddable in other CLIs.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigArgs {
    /// Directory to start config discovery from (relative to the working directory)
    #[arg(long, value_name = "DIR")]
    pub config_directory: Option<PathBuf>,

    /// How ancestor directories take part in discovery
    #[arg(long, value_enum, value_name = "MODE")]
    pub hierarchical_mode: Option<HierarchicalMode>,

    /// Maximum number of directories to search, the start directory included
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Directory names that end the upward search (comma-separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub stop_at: Vec<String>,

    /// Keep searching past project-root markers such as .git or package.json
    #[arg(long)]
    pub no_stop_at_root: bool,
}

impl ConfigArgs {
    /// Flat argument map in the form the resolver accepts.
    ///
    /// Only switches that were given appear in the map.
    pub fn to_arg_map(&self) -> Map<String, Value> {
        let mut args = Map::new();
        if let Some(ref dir) = self.config_directory {
            args.insert("config_directory".into(), json!(dir.to_string_lossy()));
        }
        if let Some(mode) = self.hierarchical_mode {
            args.insert("hierarchical_mode".into(), json!(mode.as_str()));
        }
        if let Some(depth) = self.max_depth {
            args.insert("max_depth".into(), json!(depth));
        }
        if !self.stop_at.is_empty() {
            args.insert("stop_at".into(), json!(self.stop_at));
        }
        if self.no_stop_at_root {
            args.insert("stop_at_root".into(), json!(false));
        }
        args
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Print `value` to stdout in `format`.
pub fn print_value<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Load the schema file, or accept any mapping when none is given.
pub async fn load_schema(path: Option<&Path>) -> Result<Arc<dyn ConfigSchema>> {
    match path {
        Some(path) => {
            let schema = Schema::load(path)
                .await
                .with_context(|| format!("failed to load schema {}", path.display()))?;
            Ok(Arc::new(schema))
        }
        None => Ok(Arc::new(Schema::permissive())),
    }
}

/// `dir` or the process working directory.
pub fn working_directory(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir().context("cannot determine the working directory"),
    }
}
