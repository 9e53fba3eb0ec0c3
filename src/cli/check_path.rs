//! Check-path subcommand

use super::{OutputFormat, print_value, working_directory};
use crate::security::{DEFAULT_MAX_PATH_LENGTH, SecurityBoundaryChecker, SecurityOptions};
use anyhow::{Result, bail};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the check-path subcommand
#[derive(Args, Debug)]
pub struct CheckPathArgs {
    /// Path to validate
    pub path: String,

    /// Base directory relative paths resolve against, and must stay inside
    #[arg(short, long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Accept absolute paths
    #[arg(long)]
    pub allow_absolute: bool,

    /// Accept hidden (dot) path segments
    #[arg(long)]
    pub allow_hidden: bool,

    /// Accepted file extensions (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Maximum path length in characters
    #[arg(long, default_value_t = DEFAULT_MAX_PATH_LENGTH)]
    pub max_length: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

impl CheckPathArgs {
    pub fn checker(&self) -> Result<SecurityBoundaryChecker> {
        let base = working_directory(self.base_dir.as_deref())?;
        let mut options = SecurityOptions::default()
            .with_base_directory(&base)
            .with_allowed_base_dir(&base)
            .with_source("cli");
        options.allow_absolute = self.allow_absolute;
        options.allow_hidden = self.allow_hidden;
        options.max_path_length = self.max_length;
        if !self.extensions.is_empty() {
            options = options.with_allowed_extensions(&self.extensions);
        }
        Ok(SecurityBoundaryChecker::new(options))
    }
}

/// Run the check-path subcommand.
pub async fn run_check_path(args: CheckPathArgs) -> Result<()> {
    let checker = args.checker()?;
    match checker.validate(&args.path, "check-path") {
        Ok(validated) => print_value(
            &json!({
                "valid": true,
                "normalized": validated.normalized.display().to_string(),
                "resolved": validated.resolved.display().to_string(),
            }),
            args.format,
        ),
        Err(err) => {
            print_value(&json!({ "valid": false, "errors": err.errors }), args.format)?;
            bail!(err)
        }
    }
}
