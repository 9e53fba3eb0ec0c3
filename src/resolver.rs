//! Source-priority resolution.
//!
//! Exactly one source supplies the configuration, checked in this order:
//! 1. an inline payload carried by the invocation (`mcp`)
//! 2. a config file discovered from the working directory (`file`)
//! 3. environment variables (`env`)
//!
//! Values are never merged across source kinds. Merging only happens inside
//! the file source, across hierarchy levels. Whatever wins is overlaid on the
//! schema defaults, validated and checked for undeclared keys.

use crate::discovery::{HierarchicalDiscoveryResult, HierarchicalOptions};
use crate::env::{EnvOptions, EnvSource, ProcessEnv, env_var_name, resolve_env};
use crate::error::{
    ConfigError, ConfigResult, ContextError, FieldIssue, IssueCode, ParseError, SourceAttempt,
    SourceKind, ValidationError,
};
use crate::loader::{FileConfigLoader, HierarchicalFileLoader};
use crate::logging::Logger;
use crate::schema::{ConfigSchema, validate_with_defaults};
use crate::source::{ConfigSource, ResolvedConfig};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// What the caller hands over for one resolution.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    /// Inline configuration payload.
    pub inline: Option<Value>,
    pub working_directory: Option<PathBuf>,
    /// Already-parsed command-line arguments.
    pub args: Map<String, Value>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inline(mut self, config: Value) -> Self {
        self.inline = Some(config);
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }
}

/// A resolution plus the file-discovery details behind it.
#[derive(Debug, Clone)]
pub struct DetailedResolution {
    pub resolved: ResolvedConfig<Value>,
    /// Leaf path to the file that supplied it (file sources only).
    pub provenance: Option<BTreeMap<String, String>>,
    pub discovery: Option<HierarchicalDiscoveryResult>,
}

/// Decides which single source supplies the configuration.
#[derive(Clone)]
pub struct SourceResolver {
    schema: Arc<dyn ConfigSchema>,
    env_options: Option<EnvOptions>,
    /// Overrides registered before an application name was known.
    env_overrides: HashMap<String, String>,
    env: Arc<dyn EnvSource>,
    env_enabled: bool,
    file_loader: Option<Arc<dyn FileConfigLoader>>,
    logger: Logger,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("env_options", &self.env_options)
            .field("env_enabled", &self.env_enabled)
            .field("has_file_loader", &self.file_loader.is_some())
            .finish()
    }
}

impl SourceResolver {
    /// A resolver with no file loader and no application name.
    pub fn new(schema: Arc<dyn ConfigSchema>) -> Self {
        Self {
            schema,
            env_options: None,
            env_overrides: HashMap::new(),
            env: Arc::new(ProcessEnv),
            env_enabled: true,
            file_loader: None,
            logger: Logger::new().with_name("resolver"),
        }
    }

    /// Hierarchical file discovery plus process environment for `app_name`.
    pub fn standard(schema: Arc<dyn ConfigSchema>, app_name: &str) -> Self {
        let loader = HierarchicalFileLoader::new(HierarchicalOptions::new(app_name));
        Self::new(schema)
            .with_app_name(app_name)
            .with_file_loader(Arc::new(loader))
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        self.env_options = Some(match self.env_options.take() {
            Some(mut options) => {
                options.app_name = app_name;
                options
            }
            None => {
                let mut options = EnvOptions::new(app_name);
                options.overrides = self.env_overrides.clone();
                options
            }
        });
        self
    }

    /// Custom variable name for one field. Order relative to
    /// `with_app_name` does not matter.
    pub fn with_env_override(mut self, field: impl Into<String>, variable: impl Into<String>) -> Self {
        let (field, variable) = (field.into(), variable.into());
        if let Some(options) = self.env_options.as_mut() {
            options.overrides.insert(field.clone(), variable.clone());
        }
        self.env_overrides.insert(field, variable);
        self
    }

    pub fn with_env_source(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn with_env_enabled(mut self, enabled: bool) -> Self {
        self.env_enabled = enabled;
        self
    }

    pub fn with_file_loader(mut self, loader: Arc<dyn FileConfigLoader>) -> Self {
        self.file_loader = Some(loader);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn schema(&self) -> &dyn ConfigSchema {
        self.schema.as_ref()
    }

    /// Resolve and deserialize into `T`.
    pub async fn resolve<T: DeserializeOwned>(
        &self,
        context: &InvocationContext,
    ) -> ConfigResult<ResolvedConfig<T>> {
        let resolved = self.resolve_detailed(context).await?.resolved;
        let label = resolved.source.label();
        let config = serde_json::from_value(resolved.config).map_err(|e| ValidationError {
            source: label,
            issues: vec![FieldIssue::new("(root)", IssueCode::TypeMismatch, e.to_string())],
        })?;
        Ok(ResolvedConfig {
            source: resolved.source,
            config,
            hierarchical: resolved.hierarchical,
            resolution: resolved.resolution,
        })
    }

    /// Resolve to a JSON value, keeping discovery details and provenance.
    pub async fn resolve_detailed(
        &self,
        context: &InvocationContext,
    ) -> ConfigResult<DetailedResolution> {
        let mut attempts = Vec::new();

        // 1. Inline payload: validation failure is final.
        if let Some(ref raw) = context.inline {
            if !raw.is_object() {
                return Err(ParseError::NotAMapping {
                    source_label: "mcp".to_string(),
                    found: kind_of(raw).to_string(),
                }
                .into());
            }
            let config = validate_with_defaults(self.schema.as_ref(), raw.clone(), "mcp")?;
            self.logger.debug("using inline configuration");
            return Ok(DetailedResolution {
                resolved: ResolvedConfig {
                    source: ConfigSource::Mcp {
                        raw: raw.clone(),
                        received_at: Utc::now(),
                    },
                    config,
                    hierarchical: false,
                    resolution: "provided inline with the invocation (mcp)".to_string(),
                },
                provenance: None,
                discovery: None,
            });
        }
        attempts.push(SourceAttempt {
            kind: SourceKind::Mcp,
            reason: "no inline configuration in the invocation".to_string(),
        });

        // 2. Discovered files.
        match (&context.working_directory, &self.file_loader) {
            (None, _) => attempts.push(SourceAttempt {
                kind: SourceKind::File,
                reason: "no working directory".to_string(),
            }),
            (Some(_), None) => attempts.push(SourceAttempt {
                kind: SourceKind::File,
                reason: "no file loader configured".to_string(),
            }),
            (Some(dir), Some(loader)) => match loader.load(dir, &context.args).await {
                Ok(Some(loaded)) => {
                    let source = ConfigSource::File(loaded.source);
                    let config =
                        validate_with_defaults(self.schema.as_ref(), loaded.value, &source.label())?;
                    let resolution = describe_file_source(&source);
                    self.logger.debug(&resolution);
                    return Ok(DetailedResolution {
                        resolved: ResolvedConfig {
                            source,
                            config,
                            hierarchical: loaded.hierarchical,
                            resolution,
                        },
                        provenance: Some(loaded.provenance),
                        discovery: Some(loaded.discovery),
                    });
                }
                Ok(None) => attempts.push(SourceAttempt {
                    kind: SourceKind::File,
                    reason: format!("no config file found from {}", dir.display()),
                }),
                Err(err @ (ConfigError::Parse(_) | ConfigError::Validation(_))) => {
                    return Err(err);
                }
                Err(err) => {
                    self.logger
                        .warning(&format!("file configuration unavailable: {err}"));
                    attempts.push(SourceAttempt {
                        kind: SourceKind::File,
                        reason: err.to_string(),
                    });
                }
            },
        }

        // 3. Environment variables.
        match (&self.env_options, self.env_enabled) {
            (_, false) => attempts.push(SourceAttempt {
                kind: SourceKind::Env,
                reason: "environment resolution disabled".to_string(),
            }),
            (None, true) => attempts.push(SourceAttempt {
                kind: SourceKind::Env,
                reason: "no application name configured".to_string(),
            }),
            (Some(options), true) => {
                match resolve_env(self.schema.as_ref(), options, self.env.as_ref(), &self.logger)? {
                    Some(env) => {
                        let resolution = format!(
                            "read from {} environment variable{} ({})",
                            env.variables.len(),
                            if env.variables.len() == 1 { "" } else { "s" },
                            env.variables.keys().cloned().collect::<Vec<_>>().join(", ")
                        );
                        self.logger.debug(&resolution);
                        return Ok(DetailedResolution {
                            resolved: ResolvedConfig {
                                source: ConfigSource::Env {
                                    variables: env.variables,
                                    read_at: env.read_at,
                                },
                                config: env.config,
                                hierarchical: false,
                                resolution,
                            },
                            provenance: None,
                            discovery: None,
                        });
                    }
                    None => attempts.push(SourceAttempt {
                        kind: SourceKind::Env,
                        reason: format!(
                            "no {}_* variables set for schema fields",
                            env_var_name(&options.app_name, "").trim_end_matches('_')
                        ),
                    }),
                }
            }
        }

        debug!(attempts = attempts.len(), "no configuration source available");
        Err(ContextError { attempts }.into())
    }
}

fn describe_file_source(source: &ConfigSource) -> String {
    let ConfigSource::File(file) = source else {
        return source.label();
    };
    match file.parents.len() {
        0 => format!("loaded from {}", file.path.display()),
        1 => format!("loaded from {} (merged with 1 parent config)", file.path.display()),
        n => format!(
            "loaded from {} (merged with {} parent configs)",
            file.path.display(),
            n
        ),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
