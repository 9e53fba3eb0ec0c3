//! Extra-key detection: keys present in a configuration but not declared by
//! its schema.

use super::{ConfigSchema, FieldKind};
use crate::error::{FieldIssue, IssueCode, ValidationError};
use crate::merge::join_path;
use serde_json::Value;
use std::collections::HashSet;

/// Fail with every undeclared key in `config`, or pass.
///
/// Subtrees under open (record/any) fields are exempt. For arrays the first
/// object element stands in for the element shape. Only the outermost
/// undeclared key of a subtree is reported.
pub fn check_extra_keys(
    config: &Value,
    schema: &dyn ConfigSchema,
    source: &str,
) -> Result<(), ValidationError> {
    if schema.is_open() {
        return Ok(());
    }

    let allowed: HashSet<String> = schema.fields().into_iter().collect();
    let open: Vec<String> = allowed
        .iter()
        .filter(|path| schema.field_kind(path).is_some_and(|kind| is_open_kind(&kind)))
        .cloned()
        .collect();

    let mut extra = Vec::new();
    collect_extra(config, "", &allowed, &open, &mut extra);
    if extra.is_empty() {
        return Ok(());
    }

    extra.sort();
    Err(ValidationError {
        source: source.to_string(),
        issues: extra
            .into_iter()
            .map(|path| {
                let message = format!("unrecognized key '{path}' is not declared in the schema");
                FieldIssue::new(path, IssueCode::UnknownKey, message)
            })
            .collect(),
    })
}

/// Open after unwrapping any array layers.
fn is_open_kind(kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Open => true,
        FieldKind::Array(items) => is_open_kind(items),
        _ => false,
    }
}

fn collect_extra(
    value: &Value,
    path: &str,
    allowed: &HashSet<String>,
    open: &[String],
    extra: &mut Vec<String>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = join_path(path, key);
                if !allowed.contains(&child_path) {
                    extra.push(child_path);
                    continue;
                }
                if open.iter().any(|o| *o == child_path) {
                    continue;
                }
                collect_extra(child, &child_path, allowed, open, extra);
            }
        }
        Value::Array(items) => {
            if let Some(first_object) = items.iter().find(|item| item.is_object()) {
                collect_extra(first_object, path, allowed, open, extra);
            }
        }
        _ => {}
    }
}
