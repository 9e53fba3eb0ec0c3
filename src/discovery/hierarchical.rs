//! Hierarchical discovery modes.
//!
//! The engine is a pure function of its options: it walks ancestors (or not),
//! runs single-directory discovery at each level and reports what it found.
//! Reading file contents and deciding whether to honour an in-file override
//! block is the caller's job; [`HierarchicalOverrides`] only parses and
//! applies such a block.

use super::ancestors::{AncestorOptions, ancestors_of};
use super::directory::{DiscoveredConfig, DiscoveryOptions, discover_at_level};
use crate::security::{absolutize, is_forbidden_directory};
use heck::ToLowerCamelCase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Reserved top-level key holding the override block.
pub const HIERARCHICAL_KEY: &str = "hierarchical";

/// How ancestor directories take part in discovery.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum HierarchicalMode {
    /// Collect a config at every ancestor level and merge them.
    #[default]
    Enabled,
    /// Search only the start directory.
    Disabled,
    /// Use the first ancestor level that has a config.
    RootOnly,
    /// Search only the start directory; composition comes from `extends`.
    Explicit,
}

impl HierarchicalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchicalMode::Enabled => "enabled",
            HierarchicalMode::Disabled => "disabled",
            HierarchicalMode::RootOnly => "root-only",
            HierarchicalMode::Explicit => "explicit",
        }
    }
}

impl fmt::Display for HierarchicalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchicalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "enabled" => Ok(HierarchicalMode::Enabled),
            "disabled" => Ok(HierarchicalMode::Disabled),
            "root-only" | "rootonly" => Ok(HierarchicalMode::RootOnly),
            "explicit" => Ok(HierarchicalMode::Explicit),
            other => Err(format!("unknown hierarchical mode: {other}")),
        }
    }
}

/// Options for [`discover_hierarchical`].
#[derive(Debug, Clone)]
pub struct HierarchicalOptions {
    pub mode: HierarchicalMode,
    pub discovery: DiscoveryOptions,
    pub ancestors: AncestorOptions,
}

impl HierarchicalOptions {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            mode: HierarchicalMode::default(),
            discovery: DiscoveryOptions::new(app_name),
            ancestors: AncestorOptions::default(),
        }
    }

    pub fn with_mode(mut self, mode: HierarchicalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryOptions) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_ancestors(mut self, ancestors: AncestorOptions) -> Self {
        self.ancestors = ancestors;
        self
    }
}

/// Everything one discovery pass found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchicalDiscoveryResult {
    pub mode: HierarchicalMode,
    pub primary: Option<DiscoveredConfig>,
    /// Every match, most specific first.
    pub configs: Vec<DiscoveredConfig>,
    pub searched_directories: Vec<PathBuf>,
    pub should_merge: bool,
}

impl HierarchicalDiscoveryResult {
    /// Matches after the primary, in decreasing specificity.
    pub fn parents(&self) -> &[DiscoveredConfig] {
        self.configs.get(1..).unwrap_or(&[])
    }
}

/// Discover config files starting at `start` under `options.mode`.
pub async fn discover_hierarchical(
    start: &Path,
    options: &HierarchicalOptions,
) -> HierarchicalDiscoveryResult {
    let start = absolutize(start);
    let mode = options.mode;

    let (configs, searched_directories) = match mode {
        HierarchicalMode::Disabled | HierarchicalMode::Explicit => {
            if is_forbidden_directory(&start) {
                debug!(dir = %start.display(), "start directory is forbidden; not searched");
                (Vec::new(), Vec::new())
            } else {
                let found = discover_at_level(&start, 0, &options.discovery).await;
                (found.config.into_iter().collect(), vec![start.clone()])
            }
        }
        HierarchicalMode::RootOnly => {
            let walk = ancestors_of(&start, &options.ancestors).await;
            let mut searched = Vec::new();
            let mut configs = Vec::new();
            for (level, dir) in walk.directories.into_iter().enumerate() {
                let found = discover_at_level(&dir, level, &options.discovery).await;
                searched.push(dir);
                if let Some(config) = found.config {
                    configs.push(config);
                    break;
                }
            }
            (configs, searched)
        }
        HierarchicalMode::Enabled => {
            let walk = ancestors_of(&start, &options.ancestors).await;
            let mut configs = Vec::new();
            for (level, dir) in walk.directories.iter().enumerate() {
                if let Some(config) = discover_at_level(dir, level, &options.discovery).await.config {
                    configs.push(config);
                }
            }
            (configs, walk.directories)
        }
    };

    let should_merge = mode == HierarchicalMode::Enabled && configs.len() > 1;
    debug!(
        mode = %mode,
        found = configs.len(),
        searched = searched_directories.len(),
        "hierarchical discovery finished"
    );

    HierarchicalDiscoveryResult {
        mode,
        primary: configs.first().cloned(),
        configs,
        searched_directories,
        should_merge,
    }
}

/// Recognized fields of a file's `hierarchical` block.
///
/// Keys are accepted in camelCase, snake_case or kebab-case. Unknown keys and
/// values of the wrong shape are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchicalOverrides {
    pub mode: Option<HierarchicalMode>,
    pub max_depth: Option<usize>,
    pub stop_at: Option<Vec<String>>,
    pub stop_at_root: Option<bool>,
}

impl HierarchicalOverrides {
    /// Read the override block from a parsed config document.
    pub fn from_document(document: &Value) -> Self {
        match document.get(HIERARCHICAL_KEY) {
            Some(block) => Self::from_block(block),
            None => Self::default(),
        }
    }

    pub fn from_block(block: &Value) -> Self {
        let mut overrides = Self::default();
        let Some(map) = block.as_object() else {
            return overrides;
        };

        for (key, value) in map {
            match key.to_lower_camel_case().as_str() {
                "mode" => {
                    overrides.mode = value.as_str().and_then(|s| s.parse().ok());
                }
                "maxDepth" => {
                    overrides.max_depth = value.as_u64().map(|d| d as usize);
                }
                "stopAt" => {
                    overrides.stop_at = match value {
                        Value::String(s) => Some(vec![s.clone()]),
                        Value::Array(items) => items
                            .iter()
                            .map(|i| i.as_str().map(str::to_string))
                            .collect(),
                        _ => None,
                    };
                }
                "stopAtRoot" => {
                    overrides.stop_at_root = value.as_bool();
                }
                _ => {}
            }
        }
        overrides
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether applying these overrides changes how discovery would run.
    pub fn changes(&self, options: &HierarchicalOptions) -> bool {
        self.mode.is_some_and(|m| m != options.mode)
            || self
                .max_depth
                .is_some_and(|d| d != options.ancestors.max_depth)
            || self
                .stop_at
                .as_ref()
                .is_some_and(|s| *s != options.ancestors.stop_at)
            || self
                .stop_at_root
                .is_some_and(|s| s != options.ancestors.stop_at_root)
    }

    pub fn apply(&self, options: &HierarchicalOptions) -> HierarchicalOptions {
        let mut applied = options.clone();
        if let Some(mode) = self.mode {
            applied.mode = mode;
        }
        if let Some(depth) = self.max_depth {
            applied.ancestors.max_depth = depth;
        }
        if let Some(ref stop_at) = self.stop_at {
            applied.ancestors.stop_at = stop_at.clone();
        }
        if let Some(stop_at_root) = self.stop_at_root {
            applied.ancestors.stop_at_root = stop_at_root;
        }
        applied
    }
}
