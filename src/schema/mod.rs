//! Configuration shape: the [`ConfigSchema`] capability and a declarative
//! [`Schema`] that implements it.
//!
//! Resolution only needs a handful of questions answered about the shape:
//! which field paths exist, what kind each one is, what the defaults are, and
//! whether a value conforms. Any schema system can plug in by implementing
//! the trait; [`Schema`] covers the common cases and can be written in YAML or
//! JSON:
//!
//! ```yaml
//! fields:
//!   port: { type: integer, default: 3000, minimum: 1 }
//!   api:
//!     type: object
//!     fields:
//!       key: { type: string }
//!   plugins: { type: array, items: { type: string }, optional: true }
//!   labels: { type: record, optional: true }
//! ```

pub mod overlap;

use crate::error::{ConfigError, ConfigResult, FieldIssue, IssueCode, ParseError, ValidationError};
use crate::merge::{deep_merge, join_path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

pub use overlap::check_extra_keys;

/// Closed set of field kinds the resolver dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// Array with its element kind.
    Array(Box<FieldKind>),
    Object,
    /// Accepts arbitrary sub-keys (records, `any`).
    Open,
    /// Anything else; values are passed through for the validator to judge.
    Other,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array(_) => "array",
            FieldKind::Object => "object",
            FieldKind::Open => "open",
            FieldKind::Other => "other",
        }
    }
}

/// What the resolver needs to know about a configuration shape.
pub trait ConfigSchema: Send + Sync {
    /// Every declared field path in dot notation, parents before children.
    ///
    /// Fields of object-typed array elements are listed under the array's
    /// own path, without an index.
    fn fields(&self) -> Vec<String>;

    /// Kind of the field at `path`, if declared.
    fn field_kind(&self, path: &str) -> Option<FieldKind>;

    /// Check a complete configuration value, reporting every problem.
    fn validate(&self, value: &Value) -> Result<(), Vec<FieldIssue>>;

    /// Declared defaults as a nested object.
    fn defaults(&self) -> Value;

    /// Whether the whole configuration is open (no shape to enforce).
    fn is_open(&self) -> bool {
        false
    }

    /// Human description of a field, if the schema carries one.
    fn description(&self, _path: &str) -> Option<String> {
        None
    }
}

/// Declared type of a [`FieldSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array {
        items: Box<FieldSpec>,
    },
    Object {
        #[serde(default)]
        fields: BTreeMap<String, FieldSpec>,
    },
    Record,
    Enum {
        values: Vec<Value>,
    },
    Any,
}

/// One field of a declarative [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl FieldSpec {
    pub fn of(field_type: FieldType) -> Self {
        Self {
            field_type,
            optional: false,
            nullable: false,
            default: None,
            description: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn array(items: FieldSpec) -> Self {
        Self::of(FieldType::Array {
            items: Box::new(items),
        })
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        Self::of(FieldType::Object {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    pub fn record() -> Self {
        Self::of(FieldType::Record)
    }

    pub fn enumeration<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::of(FieldType::Enum {
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn any() -> Self {
        Self::of(FieldType::Any)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn kind(&self) -> FieldKind {
        match &self.field_type {
            FieldType::String => FieldKind::String,
            FieldType::Number | FieldType::Integer => FieldKind::Number,
            FieldType::Boolean => FieldKind::Boolean,
            FieldType::Array { items } => FieldKind::Array(Box::new(items.kind())),
            FieldType::Object { .. } => FieldKind::Object,
            FieldType::Record | FieldType::Any => FieldKind::Open,
            FieldType::Enum { .. } => FieldKind::Other,
        }
    }

    fn type_name(&self) -> String {
        match &self.field_type {
            FieldType::String => "string".into(),
            FieldType::Number => "number".into(),
            FieldType::Integer => "integer".into(),
            FieldType::Boolean => "boolean".into(),
            FieldType::Array { items } => format!("array of {}", items.type_name()),
            FieldType::Object { .. } | FieldType::Record => "object".into(),
            FieldType::Enum { .. } => "one of the allowed values".into(),
            FieldType::Any => "any".into(),
        }
    }
}

/// Declarative configuration shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
    /// Accept any top-level keys and values.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub open: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema that accepts any mapping.
    pub fn permissive() -> Self {
        Self {
            fields: BTreeMap::new(),
            open: true,
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read a schema file; `.json` is parsed as JSON, anything else as YAML.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::io(path, e))?;
        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&text).map_err(|e| e.to_string())
        } else {
            Self::from_yaml_str(&text).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| {
            ParseError::File {
                path: path.to_path_buf(),
                format: if is_json { "json" } else { "yaml" }.to_string(),
                message,
            }
            .into()
        })
    }

    /// Spec at a dot path, looking through array element types.
    pub fn lookup(&self, path: &str) -> Option<&FieldSpec> {
        let mut fields = &self.fields;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let spec = fields.get(segment)?;
            if segments.peek().is_none() {
                return Some(spec);
            }
            match &element_spec(spec).field_type {
                FieldType::Object { fields: nested } => fields = nested,
                _ => return None,
            }
        }
        None
    }
}

fn element_spec(spec: &FieldSpec) -> &FieldSpec {
    let mut current = spec;
    while let FieldType::Array { items } = &current.field_type {
        current = items;
    }
    current
}

fn collect_paths(fields: &BTreeMap<String, FieldSpec>, prefix: &str, out: &mut Vec<String>) {
    for (name, spec) in fields {
        let path = join_path(prefix, name);
        out.push(path.clone());
        if let FieldType::Object { fields: nested } = &element_spec(spec).field_type {
            collect_paths(nested, &path, out);
        }
    }
}

fn collect_defaults(fields: &BTreeMap<String, FieldSpec>) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, spec) in fields {
        if let Some(ref default) = spec.default {
            out.insert(name.clone(), default.clone());
        } else if let FieldType::Object { fields: nested } = &spec.field_type {
            let nested = collect_defaults(nested);
            if !nested.is_empty() {
                out.insert(name.clone(), Value::Object(nested));
            }
        }
    }
    out
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validate_field(spec: &FieldSpec, value: Option<&Value>, path: &str, issues: &mut Vec<FieldIssue>) {
    let value = match value {
        Some(value) => value,
        None => {
            if spec.optional || spec.default.is_some() {
                return;
            }
            // A missing object is only a problem if something inside it is required.
            if let FieldType::Object { fields } = &spec.field_type {
                validate_fields(fields, None, path, issues);
            } else {
                issues.push(FieldIssue::new(path, IssueCode::Required, "required field is missing"));
            }
            return;
        }
    };

    if value.is_null() {
        if !spec.nullable && !spec.optional {
            issues.push(FieldIssue::new(
                path,
                IssueCode::TypeMismatch,
                format!("expected {}, received null", spec.type_name()),
            ));
        }
        return;
    }

    let mismatch = |issues: &mut Vec<FieldIssue>| {
        issues.push(FieldIssue::new(
            path,
            IssueCode::TypeMismatch,
            format!("expected {}, received {}", spec.type_name(), describe_value(value)),
        ));
    };

    match &spec.field_type {
        FieldType::String => {
            if !value.is_string() {
                mismatch(issues);
            }
        }
        FieldType::Number | FieldType::Integer => {
            let Some(number) = value.as_f64() else {
                mismatch(issues);
                return;
            };
            if matches!(spec.field_type, FieldType::Integer) && number.fract() != 0.0 {
                issues.push(FieldIssue::new(
                    path,
                    IssueCode::InvalidValue,
                    format!("expected integer, received {number}"),
                ));
            }
            if spec.minimum.is_some_and(|min| number < min) {
                let min = spec.minimum.unwrap_or_default();
                issues.push(FieldIssue::new(
                    path,
                    IssueCode::InvalidValue,
                    format!("{number} is less than the minimum of {min}"),
                ));
            }
            if spec.maximum.is_some_and(|max| number > max) {
                let max = spec.maximum.unwrap_or_default();
                issues.push(FieldIssue::new(
                    path,
                    IssueCode::InvalidValue,
                    format!("{number} is greater than the maximum of {max}"),
                ));
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                mismatch(issues);
            }
        }
        FieldType::Array { items } => match value.as_array() {
            Some(elements) => {
                for (index, element) in elements.iter().enumerate() {
                    validate_field(items, Some(element), &format!("{path}[{index}]"), issues);
                }
            }
            None => mismatch(issues),
        },
        FieldType::Object { fields } => match value.as_object() {
            Some(map) => validate_fields(fields, Some(map), path, issues),
            None => mismatch(issues),
        },
        FieldType::Record => {
            if !value.is_object() {
                mismatch(issues);
            }
        }
        FieldType::Enum { values } => {
            if !values.contains(value) {
                let allowed: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                issues.push(FieldIssue::new(
                    path,
                    IssueCode::InvalidValue,
                    format!("{value} is not one of [{}]", allowed.join(", ")),
                ));
            }
        }
        FieldType::Any => {}
    }
}

fn validate_fields(
    fields: &BTreeMap<String, FieldSpec>,
    map: Option<&Map<String, Value>>,
    prefix: &str,
    issues: &mut Vec<FieldIssue>,
) {
    for (name, spec) in fields {
        let value = map.and_then(|m| m.get(name));
        validate_field(spec, value, &join_path(prefix, name), issues);
    }
}

impl ConfigSchema for Schema {
    fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_paths(&self.fields, "", &mut out);
        out
    }

    fn field_kind(&self, path: &str) -> Option<FieldKind> {
        self.lookup(path).map(FieldSpec::kind)
    }

    fn validate(&self, value: &Value) -> Result<(), Vec<FieldIssue>> {
        let Some(map) = value.as_object() else {
            return Err(vec![FieldIssue::new(
                "(root)",
                IssueCode::TypeMismatch,
                format!("expected object, received {}", describe_value(value)),
            )]);
        };
        if self.open {
            return Ok(());
        }

        let mut issues = Vec::new();
        validate_fields(&self.fields, Some(map), "", &mut issues);
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    fn defaults(&self) -> Value {
        Value::Object(collect_defaults(&self.fields))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn description(&self, path: &str) -> Option<String> {
        self.lookup(path).and_then(|spec| spec.description.clone())
    }
}

/// Overlay `value` on the schema defaults, then validate the result and check
/// it for undeclared keys.
///
/// Returns the merged value. `source` labels the error.
pub fn validate_with_defaults(
    schema: &dyn ConfigSchema,
    value: Value,
    source: &str,
) -> Result<Value, ValidationError> {
    let merged = deep_merge(schema.defaults(), value);
    let mut issues = match schema.validate(&merged) {
        Ok(()) => Vec::new(),
        Err(issues) => issues,
    };
    if let Err(extra) = check_extra_keys(&merged, schema, source) {
        issues.extend(extra.issues);
    }
    if issues.is_empty() {
        Ok(merged)
    } else {
        Err(ValidationError {
            source: source.to_string(),
            issues,
        })
    }
}

/// Field paths whose values the environment can supply.
///
/// Excludes object containers and anything nested inside arrays or open
/// fields.
pub fn leaf_fields(schema: &dyn ConfigSchema) -> Vec<(String, FieldKind)> {
    schema
        .fields()
        .into_iter()
        .filter_map(|path| {
            let kind = schema.field_kind(&path)?;
            if kind == FieldKind::Object || has_opaque_ancestor(schema, &path) {
                return None;
            }
            Some((path, kind))
        })
        .collect()
}

fn has_opaque_ancestor(schema: &dyn ConfigSchema, path: &str) -> bool {
    path.match_indices('.').any(|(idx, _)| {
        matches!(
            schema.field_kind(&path[..idx]),
            Some(FieldKind::Array(_)) | Some(FieldKind::Open)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Schema {
        Schema::new()
            .field("port", FieldSpec::integer().with_default(3000).min(1.0).max(65535.0))
            .field(
                "api",
                FieldSpec::object([
                    ("key", FieldSpec::string()),
                    ("baseUrl", FieldSpec::string().optional()),
                ]),
            )
            .field(
                "servers",
                FieldSpec::array(FieldSpec::object([("name", FieldSpec::string())])).optional(),
            )
            .field("labels", FieldSpec::record().optional())
            .field("level", FieldSpec::enumeration(["debug", "info"]).with_default("info"))
    }

    #[test]
    fn test_fields_include_array_element_children() {
        let fields = sample().fields();
        assert!(fields.contains(&"api.key".to_string()));
        assert!(fields.contains(&"servers.name".to_string()));
        assert!(fields.contains(&"labels".to_string()));
    }

    #[test]
    fn test_field_kinds() {
        let schema = sample();
        assert_eq!(schema.field_kind("port"), Some(FieldKind::Number));
        assert_eq!(schema.field_kind("api"), Some(FieldKind::Object));
        assert_eq!(schema.field_kind("labels"), Some(FieldKind::Open));
        assert_eq!(schema.field_kind("level"), Some(FieldKind::Other));
        assert_eq!(schema.field_kind("servers.name"), Some(FieldKind::String));
        assert_eq!(
            schema.field_kind("servers"),
            Some(FieldKind::Array(Box::new(FieldKind::Object)))
        );
        assert_eq!(schema.field_kind("api.missing"), None);
    }

    #[test]
    fn test_validate_collects_every_issue() {
        let issues = sample()
            .validate(&json!({
                "port": "80",
                "servers": [{"name": "a"}, {"name": 3}],
                "level": "trace"
            }))
            .unwrap_err();
        let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["api.key", "level", "port", "servers[1].name"]);
        assert_eq!(issues[0].code, IssueCode::Required);
        assert_eq!(issues[1].code, IssueCode::InvalidValue);
        assert_eq!(issues[2].code, IssueCode::TypeMismatch);
    }

    #[test]
    fn test_number_bounds() {
        let issues = sample()
            .validate(&json!({"port": 70000, "api": {"key": "k"}}))
            .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::InvalidValue);
    }

    #[test]
    fn test_defaults_are_valid() {
        let schema = sample();
        let mut defaults = schema.defaults();
        assert_eq!(defaults, json!({"port": 3000, "level": "info"}));
        defaults["api"] = json!({"key": "k"});
        assert!(schema.validate(&defaults).is_ok());
    }

    #[test]
    fn test_leaf_fields_skip_arrays_and_objects() {
        let schema = sample();
        let leaves: Vec<String> = leaf_fields(&schema).into_iter().map(|(p, _)| p).collect();
        assert!(leaves.contains(&"api.key".to_string()));
        assert!(leaves.contains(&"servers".to_string()));
        assert!(!leaves.contains(&"servers.name".to_string()));
        assert!(!leaves.contains(&"api".to_string()));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let schema = Schema::from_yaml_str(
            r#"
fields:
  port: { type: number, default: 8080 }
  api:
    type: object
    fields:
      key: { type: string, description: "API token" }
  tags: { type: array, items: { type: string }, optional: true }
"#,
        )
        .unwrap();
        assert_eq!(schema.field_kind("api.key"), Some(FieldKind::String));
        assert_eq!(schema.description("api.key").as_deref(), Some("API token"));
        assert_eq!(
            schema.field_kind("tags"),
            Some(FieldKind::Array(Box::new(FieldKind::String)))
        );
        assert_eq!(schema.defaults(), json!({"port": 8080}));
    }

    #[test]
    fn test_validate_with_defaults_fills_and_reports() {
        let schema = sample();
        let merged =
            validate_with_defaults(&schema, json!({"api": {"key": "k"}}), "file").unwrap();
        assert_eq!(merged["port"], json!(3000));
        assert_eq!(merged["level"], json!("info"));

        let err = validate_with_defaults(&schema, json!({"api": {}, "extra": 1}), "mcp")
            .unwrap_err();
        assert_eq!(err.source, "mcp");
        assert!(err.has_code(IssueCode::Required));
        assert!(err.has_code(IssueCode::UnknownKey));
    }

    #[test]
    fn test_permissive_accepts_any_mapping() {
        let schema = Schema::permissive();
        assert!(schema.validate(&json!({"anything": [1, 2]})).is_ok());
        assert!(schema.validate(&json!([1])).is_err());
    }
}
