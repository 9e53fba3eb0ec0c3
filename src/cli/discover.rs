//! Discover subcommand
//!
//! Prints the hierarchical discovery result without reading any file
//! contents.

use super::{ConfigArgs, OutputFormat, print_value, working_directory};
use crate::discovery::{HierarchicalOptions, discover_hierarchical};
use crate::loader::HierarchicalFileLoader;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the discover subcommand
#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Application name used in config file names
    #[arg(short, long)]
    pub app: String,

    /// Working directory (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Skip hidden conventions such as .{app}rc
    #[arg(long)]
    pub no_hidden: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Run the discover subcommand.
pub async fn run_discover(args: DiscoverArgs) -> Result<()> {
    let mut options = HierarchicalOptions::new(&args.app);
    options.discovery.search_hidden = !args.no_hidden;

    let working = working_directory(args.dir.as_deref())?;
    let (start, options) =
        HierarchicalFileLoader::new(options).options_for(&working, &args.config.to_arg_map())?;
    let result = discover_hierarchical(&start, &options).await;
    print_value(&result, args.format)
}
