//! Structured error types for configuration resolution.
//!
//! Every failure carries machine-checkable fields (kind, code, path, field)
//! so callers can branch on the error without matching message text.

use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Closed set of security boundary violation codes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityCode {
    PathTraversal,
    PathTooLong,
    PathAbsoluteNotAllowed,
    PathHiddenFile,
    PathInvalidExtension,
    PathOutsideAllowed,
    PathSymlinkEscape,
}

impl SecurityCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityCode::PathTraversal => "path-traversal",
            SecurityCode::PathTooLong => "path-too-long",
            SecurityCode::PathAbsoluteNotAllowed => "path-absolute-not-allowed",
            SecurityCode::PathHiddenFile => "path-hidden-file",
            SecurityCode::PathInvalidExtension => "path-invalid-extension",
            SecurityCode::PathOutsideAllowed => "path-outside-allowed",
            SecurityCode::PathSymlinkEscape => "path-symlink-escape",
        }
    }
}

impl fmt::Display for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rejected aspect of a candidate path.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SecurityValidationError {
    pub field: String,
    pub message: String,
    pub code: SecurityCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub source: String,
}

/// All boundary violations found for one candidate path.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SecurityError {
    pub operation: String,
    pub errors: Vec<SecurityValidationError>,
}

impl SecurityError {
    /// Whether any collected violation carries `code`.
    pub fn has_code(&self, code: SecurityCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn codes(&self) -> Vec<SecurityCode> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "security validation failed for {} ({} violation{})",
            self.operation,
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" }
        )?;
        for err in &self.errors {
            write!(f, "; [{}] {}", err.code, err.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for SecurityError {}

/// A source value could not be turned into configuration data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// An environment variable did not match its field's declared type.
    #[error("cannot parse {variable}={value:?} for field '{field}': expected {expected}")]
    EnvValue {
        variable: String,
        field: String,
        value: String,
        expected: String,
    },
    /// A discovered file has malformed contents.
    #[error("failed to parse {format} config {}: {message}", path.display())]
    File {
        path: PathBuf,
        format: String,
        message: String,
    },
    /// The configured parser cannot read this format.
    #[error("unsupported config format {format} for {}", path.display())]
    UnsupportedFormat { path: PathBuf, format: String },
    /// A value handed to the resolver is not a key/value mapping.
    #[error("{source_label} configuration must be a mapping, found {found}")]
    NotAMapping { source_label: String, found: String },
}

/// Kinds of schema problems reported in a [`ValidationError`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Required,
    TypeMismatch,
    InvalidValue,
    UnknownKey,
}

/// One schema problem at one field path.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldIssue {
    pub path: String,
    pub code: IssueCode,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

/// The resolved value does not satisfy the schema.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    /// Which source produced the rejected value (e.g. `mcp`, `file(...)`, `env`).
    pub source: String,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn paths(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.path.as_str()).collect()
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} configuration:", self.source)?;
        for issue in &self.issues {
            write!(f, " {}: {};", issue.path, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Source kinds in resolution order.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Mcp,
    File,
    Env,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Mcp => write!(f, "mcp"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Env => write!(f, "env"),
        }
    }
}

/// Why one source kind did not produce configuration.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceAttempt {
    pub kind: SourceKind,
    pub reason: String,
}

/// No source could supply configuration.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContextError {
    pub attempts: Vec<SourceAttempt>,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no configuration source available")?;
        for attempt in &self.attempts {
            write!(f, "; {}: {}", attempt.kind, attempt.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ContextError {}

/// Error categories for programmatic handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Security,
    Parse,
    Validation,
    Context,
    Io,
    AlreadyExists,
}

/// Top-level error returned by discovery, loading and resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to overwrite existing file {}", path.display())]
    AlreadyExists { path: PathBuf },
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Security(_) => ErrorKind::Security,
            ConfigError::Parse(_) => ErrorKind::Parse,
            ConfigError::Validation(_) => ErrorKind::Validation,
            ConfigError::Context(_) => ErrorKind::Context,
            ConfigError::Io { .. } => ErrorKind::Io,
            ConfigError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
        }
    }

    /// Render the error as a structured JSON payload.
    pub fn to_json(&self) -> Value {
        let details = match self {
            ConfigError::Security(err) => json!({
                "operation": err.operation,
                "errors": err.errors,
            }),
            ConfigError::Parse(err) => json!({ "parse": parse_details(err) }),
            ConfigError::Validation(err) => json!({
                "source": err.source,
                "issues": err.issues,
            }),
            ConfigError::Context(err) => json!({ "attempts": err.attempts }),
            ConfigError::Io { path, source } => json!({
                "path": path.display().to_string(),
                "reason": source.to_string(),
            }),
            ConfigError::AlreadyExists { path } => json!({
                "path": path.display().to_string(),
            }),
        };
        json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "details": details,
        })
    }
}

fn parse_details(err: &ParseError) -> Value {
    match err {
        ParseError::EnvValue {
            variable,
            field,
            value,
            expected,
        } => json!({
            "variable": variable,
            "field": field,
            "value": value,
            "expected": expected,
        }),
        ParseError::File {
            path,
            format,
            message,
        } => json!({
            "path": path.display().to_string(),
            "format": format,
            "reason": message,
        }),
        ParseError::UnsupportedFormat { path, format } => json!({
            "path": path.display().to_string(),
            "format": format,
        }),
        ParseError::NotAMapping {
            source_label,
            found,
        } => json!({ "source": source_label, "found": found }),
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
