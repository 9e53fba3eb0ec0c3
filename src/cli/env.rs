//! Env subcommand
//!
//! Lists the variable each schema field reads from, and whether it is set.

use super::{OutputFormat, print_value};
use crate::env::{EnvOptions, EnvSource, ProcessEnv};
use crate::schema::{ConfigSchema, leaf_fields};
use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

/// Arguments for the env subcommand
#[derive(Args, Debug)]
pub struct EnvArgs {
    /// Application name used as the variable prefix
    #[arg(short, long)]
    pub app: String,

    /// Custom variable for a field, as field=VARIABLE (repeatable)
    #[arg(long = "override", value_name = "FIELD=VAR")]
    pub overrides: Vec<String>,

    /// Only list variables that are currently set
    #[arg(long)]
    pub set_only: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// One row of the env listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvMapping {
    pub field: String,
    pub kind: String,
    pub variable: String,
    pub custom_mapped: bool,
    pub set: bool,
}

fn parse_overrides(raw: &[String], app: &str) -> Result<EnvOptions> {
    let mut options = EnvOptions::new(app);
    for item in raw {
        let Some((field, variable)) = item.split_once('=') else {
            bail!("invalid --override '{item}': expected field=VARIABLE");
        };
        let (field, variable) = (field.trim(), variable.trim());
        if field.is_empty() || variable.is_empty() {
            bail!("invalid --override '{item}': field and variable must be non-empty");
        }
        options = options.with_override(field, variable);
    }
    Ok(options)
}

/// Build the env listing for `schema`.
pub fn env_mappings(
    schema: &dyn ConfigSchema,
    options: &EnvOptions,
    env: &dyn EnvSource,
) -> Vec<EnvMapping> {
    leaf_fields(schema)
        .into_iter()
        .map(|(field, kind)| {
            let (variable, custom_mapped) = options.variable_for(&field);
            let set = env.get(&variable).is_some();
            EnvMapping {
                field,
                kind: kind.name().to_string(),
                variable,
                custom_mapped,
                set,
            }
        })
        .collect()
}

/// Run the env subcommand.
pub async fn run_env(schema: Arc<dyn ConfigSchema>, args: EnvArgs) -> Result<()> {
    let options = parse_overrides(&args.overrides, &args.app)?;
    let mut mappings = env_mappings(schema.as_ref(), &options, &ProcessEnv);
    if args.set_only {
        mappings.retain(|m| m.set);
    }
    print_value(&mappings, args.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, Schema};
    use std::collections::HashMap;

    #[test]
    fn test_env_mappings() {
        let schema = Schema::new()
            .field("apiKey", FieldSpec::string())
            .field("port", FieldSpec::integer().optional())
            .field(
                "database",
                FieldSpec::object([("url", FieldSpec::string())]),
            );
        let options =
            parse_overrides(&["port = SERVICE_PORT".to_string()], "riotplan").unwrap();
        let env: HashMap<String, String> =
            HashMap::from([("RIOTPLAN_API_KEY".to_string(), "secret".to_string())]);

        let mappings = env_mappings(&schema, &options, &env);
        let by_field: HashMap<_, _> = mappings.iter().map(|m| (m.field.as_str(), m)).collect();

        assert!(!by_field.contains_key("database"));
        assert_eq!(by_field["apiKey"].variable, "RIOTPLAN_API_KEY");
        assert!(by_field["apiKey"].set);
        assert_eq!(by_field["port"].variable, "SERVICE_PORT");
        assert!(by_field["port"].custom_mapped);
        assert!(!by_field["port"].set);
        assert_eq!(by_field["database.url"].variable, "RIOTPLAN_DATABASE_URL");
    }

    #[test]
    fn test_rejects_malformed_override() {
        assert!(parse_overrides(&["port".to_string()], "app").is_err());
        assert!(parse_overrides(&["=VAR".to_string()], "app").is_err());
    }
}
