//! End-to-end resolution tests.
//!
//! These drive `SourceResolver` with real files on disk and an injected
//! environment, covering the inline > file > env priority chain.

use mcp_config_resolver::discovery::{AncestorOptions, HierarchicalMode, HierarchicalOptions};
use mcp_config_resolver::error::{ConfigError, IssueCode, SourceKind};
use mcp_config_resolver::loader::HierarchicalFileLoader;
use mcp_config_resolver::merge::{ArrayMergeStrategy, MergePolicy};
use mcp_config_resolver::schema::{FieldSpec, Schema};
use mcp_config_resolver::{ConfigSource, InvocationContext, SourceResolver};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Loader that never leaves the temp directory.
fn loader(app: &str, mode: HierarchicalMode) -> HierarchicalFileLoader {
    HierarchicalFileLoader::new(
        HierarchicalOptions::new(app)
            .with_mode(mode)
            .with_ancestors(AncestorOptions {
                max_depth: 3,
                stop_at_root: false,
                ..Default::default()
            }),
    )
}

fn env(vars: &[(&str, &str)]) -> Arc<HashMap<String, String>> {
    Arc::new(
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

#[derive(Debug, Deserialize, PartialEq)]
struct Api {
    key: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct RiotplanConfig {
    api: Api,
}

#[tokio::test]
async fn env_supplies_config_when_no_file_exists() {
    let temp = TempDir::new().unwrap();
    let schema = Schema::new().field("api", FieldSpec::object([("key", FieldSpec::string())]));
    let resolver = SourceResolver::new(Arc::new(schema))
        .with_app_name("riotplan")
        .with_env_source(env(&[("RIOTPLAN_API_KEY", "test-key")]))
        .with_file_loader(Arc::new(loader("riotplan", HierarchicalMode::Disabled)));

    let resolved = resolver
        .resolve::<RiotplanConfig>(&InvocationContext::new().with_working_directory(temp.path()))
        .await
        .unwrap();

    assert_eq!(resolved.source.kind(), SourceKind::Env);
    assert_eq!(resolved.config.api.key, "test-key");
    let ConfigSource::Env { variables, .. } = &resolved.source else {
        panic!("expected env source");
    };
    assert!(variables.contains_key("RIOTPLAN_API_KEY"));
    assert!(resolved.resolution.contains("RIOTPLAN_API_KEY"));
}

#[tokio::test]
async fn invalid_inline_payload_fails_even_with_valid_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "myapp.config.yaml", "port: 8080\n");
    let schema = Schema::new().field("port", FieldSpec::number());
    let resolver = SourceResolver::new(Arc::new(schema))
        .with_app_name("myapp")
        .with_env_source(env(&[("MYAPP_PORT", "9090")]))
        .with_file_loader(Arc::new(loader("myapp", HierarchicalMode::Disabled)));

    let context = InvocationContext::new()
        .with_inline(json!({"port": "not-a-number"}))
        .with_working_directory(temp.path());
    let err = resolver.resolve_detailed(&context).await.unwrap_err();

    let ConfigError::Validation(validation) = err else {
        panic!("expected validation error, got {err}");
    };
    assert_eq!(validation.source, "mcp");
    assert_eq!(validation.paths(), vec!["port"]);
    assert!(validation.has_code(IssueCode::TypeMismatch));
}

#[tokio::test]
async fn file_beats_env_and_reports_parents() {
    let temp = TempDir::new().unwrap();
    let child = temp.path().join("project");
    write(temp.path(), "myapp.config.yaml", "port: 1\nname: parent\n");
    write(&child, "myapp.config.json", r#"{"port": 2}"#);

    let schema = Schema::new()
        .field("port", FieldSpec::number())
        .field("name", FieldSpec::string().optional());
    let resolver = SourceResolver::new(Arc::new(schema))
        .with_app_name("myapp")
        .with_env_source(env(&[("MYAPP_PORT", "3")]))
        .with_file_loader(Arc::new(loader("myapp", HierarchicalMode::Enabled)));

    let detailed = resolver
        .resolve_detailed(&InvocationContext::new().with_working_directory(&child))
        .await
        .unwrap();

    let resolved = detailed.resolved;
    assert_eq!(resolved.config, json!({"port": 2, "name": "parent"}));
    assert!(resolved.hierarchical);
    assert_eq!(resolved.source.parents().len(), 1);
    assert_eq!(
        resolved.resolution,
        format!(
            "loaded from {} (merged with 1 parent config)",
            child.join("myapp.config.json").display()
        )
    );

    let provenance = detailed.provenance.unwrap();
    assert!(provenance["port"].ends_with("myapp.config.json"));
    assert!(provenance["name"].ends_with("myapp.config.yaml"));
}

#[tokio::test]
async fn malformed_file_is_not_treated_as_missing() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "myapp.config.json", "{ \"port\": ");
    let resolver = SourceResolver::new(Arc::new(Schema::permissive()))
        .with_app_name("myapp")
        .with_env_source(env(&[("MYAPP_PORT", "3")]))
        .with_file_loader(Arc::new(loader("myapp", HierarchicalMode::Disabled)));

    let err = resolver
        .resolve_detailed(&InvocationContext::new().with_working_directory(temp.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "got {err}");
}

#[tokio::test]
async fn extra_keys_in_file_are_all_reported() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "myapp.config.yaml",
        "port: 1\nprot: 2\ndatabase:\n  url: x\n  pool: 5\n",
    );
    let schema = Schema::new()
        .field("port", FieldSpec::number())
        .field(
            "database",
            FieldSpec::object([("url", FieldSpec::string())]).optional(),
        );
    let resolver = SourceResolver::new(Arc::new(schema))
        .with_file_loader(Arc::new(loader("myapp", HierarchicalMode::Disabled)));

    let err = resolver
        .resolve_detailed(&InvocationContext::new().with_working_directory(temp.path()))
        .await
        .unwrap_err();
    let ConfigError::Validation(validation) = err else {
        panic!("expected validation error, got {err}");
    };
    assert!(validation.source.starts_with("file("));
    assert_eq!(validation.paths(), vec!["database.pool", "prot"]);
    assert!(validation.has_code(IssueCode::UnknownKey));
}

#[tokio::test]
async fn nothing_available_lists_every_attempt() {
    let temp = TempDir::new().unwrap();
    let resolver = SourceResolver::new(Arc::new(Schema::permissive()))
        .with_app_name("myapp")
        .with_env_source(env(&[]))
        .with_file_loader(Arc::new(loader("myapp", HierarchicalMode::Disabled)));

    let err = resolver
        .resolve_detailed(&InvocationContext::new().with_working_directory(temp.path()))
        .await
        .unwrap_err();
    let ConfigError::Context(context) = err else {
        panic!("expected context error, got {err}");
    };
    let kinds: Vec<SourceKind> = context.attempts.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![SourceKind::Mcp, SourceKind::File, SourceKind::Env]);
}

#[tokio::test]
async fn invocation_args_redirect_discovery() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("settings"), "myapp.config.yaml", "port: 7\n");
    let resolver = SourceResolver::new(Arc::new(Schema::permissive()))
        .with_env_enabled(false)
        .with_file_loader(Arc::new(loader("myapp", HierarchicalMode::Enabled)));

    let mut args = Map::new();
    args.insert("config_directory".into(), json!("settings"));
    args.insert("hierarchical_mode".into(), json!("disabled"));
    let context = InvocationContext::new()
        .with_working_directory(temp.path())
        .with_args(args);

    let resolved = resolver.resolve::<Value>(&context).await.unwrap();
    assert_eq!(resolved.config, json!({"port": 7}));
    assert!(!resolved.hierarchical);
}

#[tokio::test]
async fn array_policy_applies_across_levels() {
    let temp = TempDir::new().unwrap();
    let child = temp.path().join("child");
    write(
        temp.path(),
        "myapp.config.yaml",
        "plugins: [base]\nmiddleware: [outer]\nhosts: [a]\n",
    );
    write(
        &child,
        "myapp.config.yaml",
        "plugins: [extra]\nmiddleware: [inner]\nhosts: [b]\n",
    );

    let policy = MergePolicy::new()
        .with_array("plugins", ArrayMergeStrategy::Append)
        .with_array("middleware", ArrayMergeStrategy::Prepend);
    let resolver = SourceResolver::new(Arc::new(Schema::permissive()))
        .with_env_enabled(false)
        .with_file_loader(Arc::new(
            loader("myapp", HierarchicalMode::Enabled).with_merge_policy(policy),
        ));

    let resolved = resolver
        .resolve::<Value>(&InvocationContext::new().with_working_directory(&child))
        .await
        .unwrap();
    assert_eq!(resolved.config["plugins"], json!(["base", "extra"]));
    assert_eq!(resolved.config["middleware"], json!(["inner", "outer"]));
    assert_eq!(resolved.config["hosts"], json!(["b"]));
}

#[tokio::test]
async fn config_directory_outside_working_tree_is_refused() {
    let temp = TempDir::new().unwrap();
    let schema = Schema::new().field("name", FieldSpec::string());
    let resolver = SourceResolver::new(Arc::new(schema))
        .with_app_name("myapp")
        .with_env_source(env(&[("MYAPP_NAME", "from-env")]))
        .with_file_loader(Arc::new(loader("myapp", HierarchicalMode::Disabled)));

    let mut args = Map::new();
    args.insert("config_directory".into(), json!("/etc"));
    let context = InvocationContext::new()
        .with_working_directory(temp.path())
        .with_args(args);

    let resolved = resolver.resolve::<Value>(&context).await.unwrap();
    assert_eq!(resolved.source.kind(), SourceKind::Env);
    assert_eq!(resolved.config, json!({"name": "from-env"}));
}
