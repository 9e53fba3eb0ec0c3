//! Reading discovered config files.
//!
//! [`ConfigParser`] turns file text into a JSON value. [`FileConfigLoader`] is
//! the collaborator the resolver asks for file-based configuration;
//! [`HierarchicalFileLoader`] is the standard implementation: discover, read,
//! honour the in-file `hierarchical` block, merge ancestry.

use crate::discovery::{
    ConfigFormat, DiscoveredConfig, HIERARCHICAL_KEY, HierarchicalDiscoveryResult,
    HierarchicalMode, HierarchicalOptions, HierarchicalOverrides, discover_hierarchical,
};
use crate::error::{ConfigError, ConfigResult, ParseError};
use crate::logging::Logger;
use crate::merge::{MergePolicy, merge_levels};
use crate::security::SecurityBoundaryChecker;
use crate::source::FileConfigSource;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Key of the explicit-mode composition directive.
pub const EXTENDS_KEY: &str = "extends";

/// Parses config file contents.
pub trait ConfigParser: Send + Sync {
    fn parse(&self, path: &Path, format: ConfigFormat, text: &str) -> Result<Value, ParseError>;
}

/// JSON and YAML parser. Script formats are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardParser;

impl ConfigParser for StandardParser {
    fn parse(&self, path: &Path, format: ConfigFormat, text: &str) -> Result<Value, ParseError> {
        let file_error = |message: String| ParseError::File {
            path: path.to_path_buf(),
            format: format.to_string(),
            message,
        };

        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let value = match format {
            ConfigFormat::Json => {
                serde_json::from_str::<Value>(text).map_err(|e| file_error(e.to_string()))?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str::<Value>(text).map_err(|e| file_error(e.to_string()))?
            }
            ConfigFormat::TypeScript | ConfigFormat::JavaScript => {
                return Err(ParseError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    format: format.to_string(),
                });
            }
        };

        match value {
            Value::Object(_) => Ok(value),
            Value::Null => Ok(Value::Object(Map::new())),
            other => Err(file_error(format!(
                "top level must be a mapping, found {}",
                value_type(&other)
            ))),
        }
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

/// Read and parse one file after the boundary checker accepts it.
pub async fn read_config_file(
    path: &Path,
    format: ConfigFormat,
    checker: &SecurityBoundaryChecker,
    parser: &dyn ConfigParser,
) -> ConfigResult<Value> {
    let directory = path.parent().unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let validated = checker
        .scoped_to(directory, true)
        .validate_async(&file_name, "read")
        .await?;

    let text = tokio::fs::read_to_string(&validated.resolved)
        .await
        .map_err(|e| ConfigError::io(&validated.resolved, e))?;
    Ok(parser.parse(&validated.resolved, format, &text)?)
}

/// File-based configuration ready for validation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    /// Merged value with the `hierarchical` block removed.
    pub value: Value,
    pub source: FileConfigSource,
    /// Whether more than one level was merged.
    pub hierarchical: bool,
    pub discovery: HierarchicalDiscoveryResult,
    /// Leaf path to the file that supplied it.
    pub provenance: BTreeMap<String, String>,
}

/// Supplies file-based configuration to the resolver.
#[async_trait]
pub trait FileConfigLoader: Send + Sync {
    /// Load configuration for `working_directory`.
    ///
    /// `Ok(None)` means nothing was found. `args` is the flat argument map of
    /// the invocation and may redirect or tune discovery.
    async fn load(
        &self,
        working_directory: &Path,
        args: &Map<String, Value>,
    ) -> ConfigResult<Option<LoadedFile>>;
}

/// Discovers config files hierarchically and merges their ancestry.
#[derive(Clone)]
pub struct HierarchicalFileLoader {
    options: HierarchicalOptions,
    parser: Arc<dyn ConfigParser>,
    merge_policy: MergePolicy,
    honor_file_overrides: bool,
    logger: Logger,
}

impl std::fmt::Debug for HierarchicalFileLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchicalFileLoader")
            .field("options", &self.options)
            .field("merge_policy", &self.merge_policy)
            .field("honor_file_overrides", &self.honor_file_overrides)
            .finish()
    }
}

impl HierarchicalFileLoader {
    pub fn new(options: HierarchicalOptions) -> Self {
        Self {
            logger: options.discovery.logger.clone(),
            options,
            parser: Arc::new(StandardParser),
            merge_policy: MergePolicy::default(),
            honor_file_overrides: true,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ConfigParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Whether a file's `hierarchical` block may change discovery.
    pub fn with_file_overrides(mut self, honor: bool) -> Self {
        self.honor_file_overrides = honor;
        self
    }

    pub fn options(&self) -> &HierarchicalOptions {
        &self.options
    }

    /// Discovery options and start directory after applying invocation args.
    ///
    /// Recognized keys: `config_directory`, `hierarchical_mode`, `max_depth`,
    /// `stop_at`, `stop_at_root`. `config_directory` is boundary-checked
    /// relative to `working_directory`.
    pub fn options_for(
        &self,
        working_directory: &Path,
        args: &Map<String, Value>,
    ) -> ConfigResult<(PathBuf, HierarchicalOptions)> {
        let start = match args.get("config_directory").and_then(Value::as_str) {
            Some(dir) => {
                self.options
                    .discovery
                    .checker
                    .scoped_to(working_directory, true)
                    .validate(dir, "config-directory")?
                    .resolved
            }
            None => working_directory.to_path_buf(),
        };

        let mut options = self.options.clone();
        if let Some(mode) = args
            .get("hierarchical_mode")
            .and_then(Value::as_str)
            .and_then(|m| m.parse::<HierarchicalMode>().ok())
        {
            options.mode = mode;
        }
        if let Some(depth) = args.get("max_depth").and_then(Value::as_u64) {
            options.ancestors.max_depth = depth as usize;
        }
        if let Some(stop_at) = args.get("stop_at").and_then(Value::as_array) {
            options.ancestors.stop_at = stop_at
                .iter()
                .filter_map(|s| s.as_str().map(str::to_string))
                .collect();
        }
        if let Some(stop_at_root) = args.get("stop_at_root").and_then(Value::as_bool) {
            options.ancestors.stop_at_root = stop_at_root;
        }
        Ok((start, options))
    }

    async fn read(
        &self,
        config: &DiscoveredConfig,
        cache: &mut HashMap<PathBuf, Value>,
    ) -> ConfigResult<Value> {
        if let Some(value) = cache.get(&config.path) {
            return Ok(value.clone());
        }
        let value = read_config_file(
            &config.path,
            config.format,
            &self.options.discovery.checker,
            self.parser.as_ref(),
        )
        .await?;
        cache.insert(config.path.clone(), value.clone());
        Ok(value)
    }

    fn strip_reserved(&self, mut value: Value, mode: HierarchicalMode, path: &Path) -> Value {
        if let Value::Object(ref mut map) = value {
            map.remove(HIERARCHICAL_KEY);
            if mode == HierarchicalMode::Explicit {
                if let Some(extends) = map.remove(EXTENDS_KEY) {
                    self.logger.info(&format!(
                        "{} declares extends {}; composition is not applied",
                        path.display(),
                        extends
                    ));
                }
            }
        }
        value
    }
}

#[async_trait]
impl FileConfigLoader for HierarchicalFileLoader {
    async fn load(
        &self,
        working_directory: &Path,
        args: &Map<String, Value>,
    ) -> ConfigResult<Option<LoadedFile>> {
        let (start, mut options) = self.options_for(working_directory, args)?;
        let mut discovery = discover_hierarchical(&start, &options).await;
        let Some(mut primary) = discovery.primary.clone() else {
            debug!(start = %start.display(), "no config file found");
            return Ok(None);
        };

        let mut cache = HashMap::new();
        if self.honor_file_overrides {
            let document = self.read(&primary, &mut cache).await?;
            let overrides = HierarchicalOverrides::from_document(&document);
            if overrides.changes(&options) {
                info!(
                    path = %primary.path.display(),
                    "config file overrides hierarchical discovery"
                );
                options = overrides.apply(&options);
                discovery = discover_hierarchical(&start, &options).await;
                match discovery.primary.clone() {
                    Some(found) => primary = found,
                    None => return Ok(None),
                }
            }
        }

        let levels: &[DiscoveredConfig] = if discovery.should_merge {
            &discovery.configs
        } else {
            std::slice::from_ref(&primary)
        };
        let mut documents = Vec::with_capacity(levels.len());
        for level in levels {
            let document = self.read(level, &mut cache).await?;
            let document = self.strip_reserved(document, discovery.mode, &level.path);
            documents.push((level.path.display().to_string(), document));
        }
        let merged = merge_levels(documents, &self.merge_policy);

        let parents = if discovery.should_merge {
            discovery
                .parents()
                .iter()
                .map(|p| FileConfigSource {
                    path: p.path.clone(),
                    format: p.format,
                    parents: Vec::new(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Some(LoadedFile {
            value: merged.value,
            source: FileConfigSource {
                path: primary.path.clone(),
                format: primary.format,
                parents,
            },
            hierarchical: discovery.should_merge,
            provenance: merged.provenance,
            discovery,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::AncestorOptions;
    use crate::logging::{LogLevel, MemorySink};
    use crate::merge::ArrayMergeStrategy;
    use serde_json::json;
    use tempfile::TempDir;

    fn loader(mode: HierarchicalMode) -> HierarchicalFileLoader {
        HierarchicalFileLoader::new(
            HierarchicalOptions::new("myapp")
                .with_mode(mode)
                .with_ancestors(AncestorOptions {
                    max_depth: 3,
                    stop_at_root: false,
                    ..Default::default()
                }),
        )
    }

    #[test]
    fn test_parser_formats() {
        let parser = StandardParser;
        let path = Path::new("app.config.yaml");
        assert_eq!(
            parser.parse(path, ConfigFormat::Yaml, "port: 80\nname: x").unwrap(),
            json!({"port": 80, "name": "x"})
        );
        assert_eq!(
            parser.parse(path, ConfigFormat::Json, r#"{"a": [1]}"#).unwrap(),
            json!({"a": [1]})
        );
        assert_eq!(parser.parse(path, ConfigFormat::Yaml, "  \n").unwrap(), json!({}));
    }

    #[test]
    fn test_parser_errors() {
        let parser = StandardParser;
        let path = Path::new("app.config.json");
        assert!(matches!(
            parser.parse(path, ConfigFormat::Json, "{ broken"),
            Err(ParseError::File { .. })
        ));
        assert!(matches!(
            parser.parse(path, ConfigFormat::Yaml, "- a\n- b"),
            Err(ParseError::File { .. })
        ));
        assert!(matches!(
            parser.parse(Path::new("app.config.ts"), ConfigFormat::TypeScript, "export default {}"),
            Err(ParseError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_merges_ancestry_with_policy() {
        let temp = TempDir::new().unwrap();
        let child = temp.path().join("child");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(
            temp.path().join("myapp.config.yaml"),
            "port: 1\nhost: parent\nplugins: [a]\n",
        )
        .unwrap();
        std::fs::write(child.join("myapp.config.json"), r#"{"port": 2, "plugins": ["b"]}"#)
            .unwrap();

        let loader = loader(HierarchicalMode::Enabled).with_merge_policy(
            MergePolicy::new().with_array("plugins", ArrayMergeStrategy::Append),
        );
        let loaded = loader.load(&child, &Map::new()).await.unwrap().unwrap();
        assert!(loaded.hierarchical);
        assert_eq!(loaded.value, json!({"port": 2, "host": "parent", "plugins": ["a", "b"]}));
        assert_eq!(loaded.source.path, child.join("myapp.config.json"));
        assert_eq!(loaded.source.parents.len(), 1);
        assert_eq!(
            loaded.provenance["host"],
            temp.path().join("myapp.config.yaml").display().to_string()
        );
    }

    #[tokio::test]
    async fn test_file_override_block_disables_hierarchy() {
        let temp = TempDir::new().unwrap();
        let child = temp.path().join("child");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(temp.path().join("myapp.config.yaml"), "host: parent\n").unwrap();
        std::fs::write(
            child.join("myapp.config.yaml"),
            "port: 2\nhierarchical:\n  mode: disabled\n",
        )
        .unwrap();

        let loaded = loader(HierarchicalMode::Enabled)
            .load(&child, &Map::new())
            .await
            .unwrap()
            .unwrap();
        assert!(!loaded.hierarchical);
        assert_eq!(loaded.discovery.mode, HierarchicalMode::Disabled);
        assert_eq!(loaded.value, json!({"port": 2}));

        let ignoring = loader(HierarchicalMode::Enabled)
            .with_file_overrides(false)
            .load(&child, &Map::new())
            .await
            .unwrap()
            .unwrap();
        assert!(ignoring.hierarchical);
        assert_eq!(ignoring.value, json!({"port": 2, "host": "parent"}));
    }

    #[tokio::test]
    async fn test_explicit_mode_strips_extends() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("myapp.config.yaml"),
            "extends: ../base.yaml\nport: 3\n",
        )
        .unwrap();
        let sink = Arc::new(MemorySink::new());
        let mut options = HierarchicalOptions::new("myapp").with_mode(HierarchicalMode::Explicit);
        options.discovery.logger = Logger::new().with_sink(sink.clone());

        let loaded = HierarchicalFileLoader::new(options)
            .load(temp.path(), &Map::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.value, json!({"port": 3}));
        assert_eq!(sink.messages_at(LogLevel::Info).len(), 1);
    }

    #[tokio::test]
    async fn test_args_redirect_and_tune_discovery() {
        let temp = TempDir::new().unwrap();
        let configs = temp.path().join("configs");
        std::fs::create_dir_all(&configs).unwrap();
        std::fs::write(configs.join("myapp.config.json"), r#"{"port": 9}"#).unwrap();

        let mut args = Map::new();
        args.insert("config_directory".into(), json!("configs"));
        args.insert("hierarchical_mode".into(), json!("disabled"));
        let loader = loader(HierarchicalMode::Enabled);
        let (start, options) = loader.options_for(temp.path(), &args).unwrap();
        assert_eq!(start, configs);
        assert_eq!(options.mode, HierarchicalMode::Disabled);

        let loaded = loader.load(temp.path(), &args).await.unwrap().unwrap();
        assert_eq!(loaded.value, json!({"port": 9}));
    }

    #[tokio::test]
    async fn test_config_directory_must_stay_in_bounds() {
        let temp = TempDir::new().unwrap();
        let loader = loader(HierarchicalMode::Disabled);
        for dir in ["/etc", "../elsewhere"] {
            let mut args = Map::new();
            args.insert("config_directory".into(), json!(dir));
            let err = loader.load(temp.path(), &args).await.unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Security, "{dir}");
        }
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("myapp.config.json"), "{ nope").unwrap();
        let err = loader(HierarchicalMode::Disabled)
            .load(temp.path(), &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(ParseError::File { .. })));
    }
}
