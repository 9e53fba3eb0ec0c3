//! Writing new config files.
//!
//! Kept apart from discovery and resolution, which never write.

use crate::discovery::ConfigFormat;
use crate::error::{ConfigError, ConfigResult, ParseError};
use crate::schema::ConfigSchema;
use crate::security::SecurityBoundaryChecker;
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Serialize the schema defaults as a config file body.
pub fn render_defaults(schema: &dyn ConfigSchema, format: ConfigFormat) -> ConfigResult<String> {
    render_value(&schema.defaults(), format)
}

pub fn render_value(value: &Value, format: ConfigFormat) -> ConfigResult<String> {
    let unsupported = || ParseError::UnsupportedFormat {
        path: PathBuf::from("<generated>"),
        format: format.to_string(),
    };
    let rendered = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(value)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        ConfigFormat::TypeScript | ConfigFormat::JavaScript => return Err(unsupported().into()),
    };
    rendered.map_err(|message| {
        ParseError::File {
            path: PathBuf::from("<generated>"),
            format: format.to_string(),
            message,
        }
        .into()
    })
}

/// Create `relative` under the checker's base directory with `contents`.
///
/// The path is boundary-checked first, parent directories are created, and an
/// existing file is never overwritten.
pub async fn create_config_file(
    checker: &SecurityBoundaryChecker,
    relative: &str,
    contents: &str,
) -> ConfigResult<PathBuf> {
    let validated = checker.validate_async(relative, "create").await?;
    let target = validated.resolved;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::io(parent, e))?;
    }

    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(ConfigError::AlreadyExists { path: target.clone() });
        }
        Err(e) => return Err(ConfigError::io(&target, e)),
    };

    file.write_all(contents.as_bytes())
        .await
        .map_err(|e| ConfigError::io(&target, e))?;
    file.flush().await.map_err(|e| ConfigError::io(&target, e))?;

    info!(path = %target.display(), "created config file");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SecurityCode};
    use crate::schema::{FieldSpec, Schema};
    use crate::security::SecurityOptions;
    use tempfile::TempDir;

    fn checker(dir: &std::path::Path) -> SecurityBoundaryChecker {
        SecurityBoundaryChecker::new(
            SecurityOptions::default()
                .with_base_directory(dir)
                .with_allowed_base_dir(dir),
        )
    }

    #[test]
    fn test_render_defaults() {
        let schema = Schema::new()
            .field("port", FieldSpec::number().with_default(8080))
            .field("name", FieldSpec::string());
        let yaml = render_defaults(&schema, ConfigFormat::Yaml).unwrap();
        assert_eq!(yaml.trim(), "port: 8080");
        let json = render_defaults(&schema, ConfigFormat::Json).unwrap();
        assert!(json.contains("\"port\": 8080"));
        assert!(render_defaults(&schema, ConfigFormat::TypeScript).is_err());
    }

    #[tokio::test]
    async fn test_creates_parents_and_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let checker = checker(temp.path());

        let path = create_config_file(&checker, "conf/myapp.config.yaml", "a: 1\n")
            .await
            .unwrap();
        assert_eq!(path, temp.path().join("conf/myapp.config.yaml"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a: 1\n");

        let err = create_config_file(&checker, "conf/myapp.config.yaml", "a: 2\n")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a: 1\n");
    }

    #[tokio::test]
    async fn test_rejects_escaping_path_before_writing() {
        let temp = TempDir::new().unwrap();
        let inner = temp.path().join("inner");
        std::fs::create_dir_all(&inner).unwrap();

        let err = create_config_file(&checker(&inner), "../escape.yaml", "x: 1")
            .await
            .unwrap_err();
        match err {
            ConfigError::Security(security) => {
                assert!(security.has_code(SecurityCode::PathTraversal));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!temp.path().join("escape.yaml").exists());
    }
}
