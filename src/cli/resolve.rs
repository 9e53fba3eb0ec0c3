//! Resolve subcommand
//!
//! Runs the full source-priority resolution and prints the winning
//! configuration together with where it came from.

use super::{ConfigArgs, OutputFormat, print_value, working_directory};
use crate::discovery::HierarchicalOptions;
use crate::loader::HierarchicalFileLoader;
use crate::merge::{ArrayMergeStrategy, MergePolicy};
use crate::resolver::{DetailedResolution, InvocationContext, SourceResolver};
use crate::schema::ConfigSchema;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the resolve subcommand
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Application name used in config file names and variable prefixes
    #[arg(short, long)]
    pub app: String,

    /// Working directory (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Inline configuration as a JSON object; wins over files and environment
    #[arg(long, value_name = "JSON")]
    pub inline: Option<String>,

    /// Do not fall back to environment variables
    #[arg(long)]
    pub no_env: bool,

    /// Ignore `hierarchical` blocks inside config files
    #[arg(long)]
    pub ignore_file_overrides: bool,

    /// Array paths whose values accumulate parent-first across levels
    #[arg(long, value_name = "PATH", value_delimiter = ',')]
    pub append: Vec<String>,

    /// Array paths whose values accumulate child-first across levels
    #[arg(long, value_name = "PATH", value_delimiter = ',')]
    pub prepend: Vec<String>,

    /// Include which file supplied each value
    #[arg(long)]
    pub provenance: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ResolveArgs {
    pub fn merge_policy(&self) -> MergePolicy {
        let policy = self
            .append
            .iter()
            .fold(MergePolicy::new(), |p, path| {
                p.with_array(path.clone(), ArrayMergeStrategy::Append)
            });
        self.prepend.iter().fold(policy, |p, path| {
            p.with_array(path.clone(), ArrayMergeStrategy::Prepend)
        })
    }

    pub fn context(&self) -> Result<InvocationContext> {
        let mut context = InvocationContext::new()
            .with_working_directory(working_directory(self.dir.as_deref())?)
            .with_args(self.config.to_arg_map());
        if let Some(ref inline) = self.inline {
            let value: Value =
                serde_json::from_str(inline).context("--inline is not valid JSON")?;
            context = context.with_inline(value);
        }
        Ok(context)
    }
}

/// Build the resolver the command line describes.
pub fn build_resolver(schema: Arc<dyn ConfigSchema>, args: &ResolveArgs) -> SourceResolver {
    let loader = HierarchicalFileLoader::new(HierarchicalOptions::new(&args.app))
        .with_merge_policy(args.merge_policy())
        .with_file_overrides(!args.ignore_file_overrides);
    SourceResolver::new(schema)
        .with_app_name(&args.app)
        .with_file_loader(Arc::new(loader))
        .with_env_enabled(!args.no_env)
}

/// Render a resolution for output.
pub fn render(detailed: &DetailedResolution, with_provenance: bool) -> Value {
    let resolved = &detailed.resolved;
    let mut out = json!({
        "source": resolved.source,
        "config": resolved.config,
        "hierarchical": resolved.hierarchical,
        "resolution": resolved.resolution,
    });
    if with_provenance {
        if let Some(ref provenance) = detailed.provenance {
            out["provenance"] = json!(provenance);
        }
    }
    out
}

/// Run the resolve subcommand.
pub async fn run_resolve(schema: Arc<dyn ConfigSchema>, args: ResolveArgs) -> Result<()> {
    let resolver = build_resolver(schema, &args);
    let context = args.context()?;

    match resolver.resolve_detailed(&context).await {
        Ok(detailed) => print_value(&render(&detailed, args.provenance), args.format),
        Err(err) => {
            print_value(&json!({ "error": err.to_json() }), args.format)?;
            Err(err.into())
        }
    }
}
