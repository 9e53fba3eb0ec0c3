//! MCP Config Resolver Library
//!
//! Resolves an application's configuration from three sources in priority
//! order: inline data handed over by an MCP client, config files discovered
//! in the working directory and its ancestors, and environment variables.
//!
//! ```no_run
//! use mcp_config_resolver::{InvocationContext, Schema, SourceResolver};
//! use std::sync::Arc;
//!
//! # async fn run() -> mcp_config_resolver::ConfigResult<()> {
//! let resolver = SourceResolver::standard(Arc::new(Schema::permissive()), "myapp");
//! let resolved = resolver
//!     .resolve::<serde_json::Value>(&InvocationContext::new().with_working_directory("."))
//!     .await?;
//! println!("{}", resolved.resolution);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod discovery;
pub mod env;
pub mod error;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod resolver;
pub mod scaffold;
pub mod schema;
pub mod security;
pub mod source;

pub use error::{ConfigError, ConfigResult, ErrorKind};
pub use resolver::{DetailedResolution, InvocationContext, SourceResolver};
pub use schema::{ConfigSchema, FieldSpec, Schema};
pub use source::{ConfigSource, ResolvedConfig};
