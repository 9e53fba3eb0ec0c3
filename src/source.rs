//! Where a resolved configuration came from.

use crate::discovery::ConfigFormat;
use crate::env::EnvVariable;
use crate::error::SourceKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A config file, with the ancestor files merged beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileConfigSource {
    pub path: PathBuf,
    pub format: ConfigFormat,
    /// Ancestor files, most specific first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<FileConfigSource>,
}

/// The single source that supplied a configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConfigSource {
    /// Inline payload handed over with the invocation.
    Mcp {
        raw: Value,
        received_at: DateTime<Utc>,
    },
    File(FileConfigSource),
    Env {
        variables: BTreeMap<String, EnvVariable>,
        read_at: DateTime<Utc>,
    },
}

impl ConfigSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ConfigSource::Mcp { .. } => SourceKind::Mcp,
            ConfigSource::File(_) => SourceKind::File,
            ConfigSource::Env { .. } => SourceKind::Env,
        }
    }

    /// Hierarchical ancestry; empty unless this is a file source.
    pub fn parents(&self) -> &[FileConfigSource] {
        match self {
            ConfigSource::File(file) => &file.parents,
            _ => &[],
        }
    }

    /// Label used in validation errors (`mcp`, `file(<path>)`, `env`).
    pub fn label(&self) -> String {
        match self {
            ConfigSource::File(file) => format!("file({})", file.path.display()),
            other => other.kind().to_string(),
        }
    }
}

/// The outcome of resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig<T> {
    pub source: ConfigSource,
    pub config: T,
    /// Whether several hierarchy levels were merged.
    pub hierarchical: bool,
    /// One-sentence account of where the configuration came from.
    pub resolution: String,
}
