//! Environment-variable configuration.
//!
//! Each schema field maps to one variable: `{APP}_{FIELD_PATH}` with dots and
//! camelCase boundaries turned into underscores (`api.baseUrl` for `myapp`
//! reads `MYAPP_API_BASE_URL`). Values are parsed according to the field's
//! declared kind and the reassembled object is validated as a whole.

use crate::error::{ConfigError, ParseError};
use crate::logging::Logger;
use crate::schema::{ConfigSchema, FieldKind, leaf_fields, validate_with_defaults};
use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::OnceLock;

/// Read-only view of an environment.
pub trait EnvSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<S: BuildHasher + Send + Sync> EnvSource for HashMap<String, String, S> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Options for [`resolve_env`].
#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    pub app_name: String,
    /// Field path to variable name; wins over the generated name.
    pub overrides: HashMap<String, String>,
}

impl EnvOptions {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, field: impl Into<String>, variable: impl Into<String>) -> Self {
        self.overrides.insert(field.into(), variable.into());
        self
    }

    /// Variable that supplies `field`, and whether it came from the override map.
    pub fn variable_for(&self, field: &str) -> (String, bool) {
        match self.overrides.get(field) {
            Some(custom) => (custom.clone(), true),
            None => (env_var_name(&self.app_name, field), false),
        }
    }
}

/// One variable that contributed to the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVariable {
    pub value: String,
    pub custom_mapped: bool,
}

/// Configuration assembled from the environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvResolution {
    /// Validated configuration, defaults included.
    pub config: Value,
    pub variables: BTreeMap<String, EnvVariable>,
    pub read_at: DateTime<Utc>,
}

fn lower_upper_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("boundary pattern is valid"))
}

fn acronym_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([A-Z])([A-Z][a-z])").expect("acronym pattern is valid"))
}

fn screaming_segment(text: &str) -> String {
    let separated: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let split = lower_upper_boundary().replace_all(&separated, "${1}_${2}");
    let split = acronym_boundary().replace_all(&split, "${1}_${2}");
    split.to_ascii_uppercase()
}

/// Generated variable name for `field_path` under `app_name`.
///
/// ```
/// use mcp_config_resolver::env::env_var_name;
///
/// assert_eq!(env_var_name("myapp", "api.baseUrl"), "MYAPP_API_BASE_URL");
/// assert_eq!(env_var_name("myapp", "APIKey"), "MYAPP_API_KEY");
/// ```
pub fn env_var_name(app_name: &str, field_path: &str) -> String {
    format!(
        "{}_{}",
        screaming_segment(app_name),
        screaming_segment(field_path)
    )
}

/// Parse a boolean the way shells and CI systems spell them.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "n" | "0" | "off" => Some(false),
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        _ => None,
    }
}

/// Parse decimal, scientific or `0x` hexadecimal numbers.
pub fn parse_number(raw: &str) -> Option<Number> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        let magnitude = i64::from_str_radix(hex, 16).ok()?;
        return Some(Number::from(if negative { -magnitude } else { magnitude }));
    }

    let parsed: f64 = text.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        return Some(Number::from(parsed as i64));
    }
    Number::from_f64(parsed)
}

fn parse_value(raw: &str, kind: &FieldKind) -> Result<Value, String> {
    match kind {
        FieldKind::Boolean => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| "boolean (true/false/yes/no/y/n/1/0/on/off)".to_string()),
        FieldKind::Number => parse_number(raw)
            .map(Value::Number)
            .ok_or_else(|| "number".to_string()),
        FieldKind::Array(element) => raw
            .split_whitespace()
            .map(|token| parse_value(token, element))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
            .map_err(|expected| format!("array of {expected}")),
        FieldKind::String
        | FieldKind::Object
        | FieldKind::Open
        | FieldKind::Other => Ok(Value::String(raw.to_string())),
    }
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };
    let mut current = root;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

/// Build configuration from the environment.
///
/// Returns `Ok(None)` when no field's variable is set. A value that does not
/// parse as its declared kind is a [`ParseError::EnvValue`]; the assembled
/// object failing the schema is a validation error with every issue.
pub fn resolve_env(
    schema: &dyn ConfigSchema,
    options: &EnvOptions,
    env: &dyn EnvSource,
    logger: &Logger,
) -> Result<Option<EnvResolution>, ConfigError> {
    let mut config = Map::new();
    let mut variables = BTreeMap::new();

    for (field, kind) in leaf_fields(schema) {
        let (variable, custom_mapped) = options.variable_for(&field);
        let Some(raw) = env.get(&variable) else {
            continue;
        };

        let value = parse_value(&raw, &kind).map_err(|expected| ParseError::EnvValue {
            variable: variable.clone(),
            field: field.clone(),
            value: raw.clone(),
            expected,
        })?;
        logger.debug(&format!("{variable} supplies {field}"));
        insert_path(&mut config, &field, value);
        variables.insert(
            variable,
            EnvVariable {
                value: raw,
                custom_mapped,
            },
        );
    }

    if variables.is_empty() {
        return Ok(None);
    }

    let config = validate_with_defaults(schema, Value::Object(config), "env")?;
    Ok(Some(EnvResolution {
        config,
        variables,
        read_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, IssueCode};
    use crate::schema::{FieldSpec, Schema};
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn schema() -> Schema {
        Schema::new()
            .field("api", FieldSpec::object([("key", FieldSpec::string())]))
            .field("port", FieldSpec::number().optional())
            .field("debug", FieldSpec::boolean().optional())
            .field("ports", FieldSpec::array(FieldSpec::number()).optional())
            .field("labels", FieldSpec::record().optional())
    }

    #[test]
    fn test_name_generation() {
        assert_eq!(env_var_name("riotplan", "api.key"), "RIOTPLAN_API_KEY");
        assert_eq!(env_var_name("myapp", "maxRetryCount"), "MYAPP_MAX_RETRY_COUNT");
        assert_eq!(env_var_name("myapp", "myHTTPServer"), "MYAPP_MY_HTTP_SERVER");
        assert_eq!(env_var_name("my-app", "oauth2Token"), "MY_APP_OAUTH2_TOKEN");
        let once = env_var_name("myapp", "server.baseURL");
        assert_eq!(once, env_var_name("myapp", "server.baseURL"));
        assert_eq!(once, once.to_ascii_uppercase());
    }

    #[test]
    fn test_parse_bool_spellings() {
        for t in ["true", "YES", "y", "1", "On"] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["false", "No", "n", "0", "off", ""] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("42"), Some(Number::from(42)));
        assert_eq!(parse_number("0x1F"), Some(Number::from(31)));
        assert_eq!(parse_number("-0x10"), Some(Number::from(-16)));
        assert_eq!(parse_number("1e3"), Some(Number::from(1000)));
        assert_eq!(parse_number("2.5").and_then(|n| n.as_f64()), Some(2.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_resolves_nested_fields() {
        let vars = env(&[
            ("RIOTPLAN_API_KEY", "test-key"),
            ("RIOTPLAN_PORTS", "  80   443 "),
            ("RIOTPLAN_DEBUG", "yes"),
        ]);
        let resolved = resolve_env(
            &schema(),
            &EnvOptions::new("riotplan"),
            &vars,
            &Logger::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(resolved.config["api"]["key"], json!("test-key"));
        assert_eq!(resolved.config["ports"], json!([80, 443]));
        assert_eq!(resolved.config["debug"], json!(true));
        assert_eq!(resolved.variables.len(), 3);
        assert!(!resolved.variables["RIOTPLAN_API_KEY"].custom_mapped);
    }

    #[test]
    fn test_nothing_set_is_none() {
        let resolved =
            resolve_env(&schema(), &EnvOptions::new("riotplan"), &env(&[]), &Logger::new())
                .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_override_map_wins() {
        let vars = env(&[("SECRET_TOKEN", "abc"), ("RIOTPLAN_API_KEY", "ignored")]);
        let options = EnvOptions::new("riotplan").with_override("api.key", "SECRET_TOKEN");
        let resolved = resolve_env(&schema(), &options, &vars, &Logger::new())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.config["api"]["key"], json!("abc"));
        assert!(resolved.variables["SECRET_TOKEN"].custom_mapped);
    }

    #[test]
    fn test_bad_number_is_parse_error() {
        let vars = env(&[("RIOTPLAN_API_KEY", "k"), ("RIOTPLAN_PORT", "eighty")]);
        let err = resolve_env(&schema(), &EnvOptions::new("riotplan"), &vars, &Logger::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        match err {
            ConfigError::Parse(ParseError::EnvValue {
                variable, field, ..
            }) => {
                assert_eq!(variable, "RIOTPLAN_PORT");
                assert_eq!(field, "port");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partial_env_fails_validation_with_full_report() {
        let vars = env(&[("RIOTPLAN_PORT", "8080")]);
        let err = resolve_env(&schema(), &EnvOptions::new("riotplan"), &vars, &Logger::new())
            .unwrap_err();
        match err {
            ConfigError::Validation(v) => {
                assert_eq!(v.source, "env");
                assert_eq!(v.paths(), vec!["api.key"]);
                assert!(v.has_code(IssueCode::Required));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_values() {
        let vars = env(&[
            ("RIOTPLAN_API_KEY", ""),
            ("RIOTPLAN_DEBUG", ""),
            ("RIOTPLAN_PORTS", ""),
        ]);
        let resolved = resolve_env(&schema(), &EnvOptions::new("riotplan"), &vars, &Logger::new())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.config["api"]["key"], json!(""));
        assert_eq!(resolved.config["debug"], json!(false));
        assert_eq!(resolved.config["ports"], json!([]));
    }
}
