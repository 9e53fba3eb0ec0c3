//! Init subcommand

use super::working_directory;
use crate::discovery::ConfigFormat;
use crate::scaffold::{create_config_file, render_defaults};
use crate::schema::ConfigSchema;
use crate::security::{SecurityBoundaryChecker, SecurityOptions};
use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// File format written by init
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InitFormat {
    #[default]
    Yaml,
    Json,
}

impl From<InitFormat> for ConfigFormat {
    fn from(format: InitFormat) -> Self {
        match format {
            InitFormat::Yaml => ConfigFormat::Yaml,
            InitFormat::Json => ConfigFormat::Json,
        }
    }
}

/// Arguments for the init subcommand
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Application name used in the config file name
    #[arg(short, long)]
    pub app: String,

    /// Directory to create the file in (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// File format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: InitFormat,
}

/// `{app}.config.{ext}` for the chosen format.
pub fn config_file_name(app: &str, format: InitFormat) -> String {
    let ext = match format {
        InitFormat::Yaml => "yaml",
        InitFormat::Json => "json",
    };
    format!("{app}.config.{ext}")
}

/// Write the schema defaults to a new config file and return its path.
pub async fn init_config(schema: &dyn ConfigSchema, args: &InitArgs) -> Result<PathBuf> {
    let dir = working_directory(args.dir.as_deref())?;
    let checker = SecurityBoundaryChecker::new(
        SecurityOptions::default()
            .with_base_directory(&dir)
            .with_allowed_base_dir(&dir)
            .with_allowed_extensions(["yaml", "json"])
            .with_source("init"),
    );
    let contents = render_defaults(schema, args.format.into())?;
    let path = create_config_file(&checker, &config_file_name(&args.app, args.format), &contents)
        .await?;
    Ok(path)
}

/// Run the init subcommand.
pub async fn run_init(schema: Arc<dyn ConfigSchema>, args: InitArgs) -> Result<()> {
    let path = init_config(schema.as_ref(), &args).await?;
    println!("Created {}", path.display());
    Ok(())
}
