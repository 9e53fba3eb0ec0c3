//! mcp-config-resolver
//!
//! Command-line front end for resolving, discovering and scaffolding
//! application configuration.

use anyhow::Result;
use clap::Parser;
use mcp_config_resolver::cli::check_path::run_check_path;
use mcp_config_resolver::cli::discover::run_discover;
use mcp_config_resolver::cli::env::run_env;
use mcp_config_resolver::cli::init::run_init;
use mcp_config_resolver::cli::resolve::run_resolve;
use mcp_config_resolver::cli::{Cli, Command, load_schema};
use mcp_config_resolver::logging::init_tracing;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        schema,
        verbose,
        log,
        command,
    } = Cli::parse();

    init_tracing(&log, verbose)?;
    debug!(?command, "starting");

    match command {
        Command::Resolve(args) => {
            let schema = load_schema(schema.as_deref()).await?;
            run_resolve(schema, args).await
        }
        Command::Discover(args) => run_discover(args).await,
        Command::Env(args) => {
            let schema = load_schema(schema.as_deref()).await?;
            run_env(schema, args).await
        }
        Command::CheckPath(args) => run_check_path(args).await,
        Command::Init(args) => {
            let schema = load_schema(schema.as_deref()).await?;
            run_init(schema, args).await
        }
    }
}
