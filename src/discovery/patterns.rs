//! Naming conventions for config files and extension priority.
//!
//! Patterns are templates with `{app}` and `{ext}` slots. Lower priority
//! numbers are checked first and win ties within one directory.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// Placeholder for the application name.
const APP_SLOT: &str = "{app}";
/// Placeholder for the file extension.
const EXT_SLOT: &str = "{ext}";

/// A filename convention such as `{app}.config.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingPattern {
    pub template: Cow<'static, str>,
    pub priority: u8,
    pub hidden: bool,
}

impl NamingPattern {
    pub const fn builtin(template: &'static str, priority: u8, hidden: bool) -> Self {
        Self {
            template: Cow::Borrowed(template),
            priority,
            hidden,
        }
    }

    pub fn custom(template: impl Into<String>, priority: u8) -> Self {
        let template = template.into();
        let hidden = template.starts_with('.');
        Self {
            template: Cow::Owned(template),
            priority,
            hidden,
        }
    }

    /// Whether the template has an extension slot.
    pub fn has_extension(&self) -> bool {
        self.template.contains(EXT_SLOT)
    }
}

/// Built-in conventions, in priority order.
pub const DEFAULT_PATTERNS: &[NamingPattern] = &[
    NamingPattern::builtin("{app}.config.{ext}", 1, false),
    NamingPattern::builtin("{app}.conf.{ext}", 2, false),
    NamingPattern::builtin(".{app}/config.{ext}", 3, true),
    NamingPattern::builtin(".{app}rc.{ext}", 4, true),
    NamingPattern::builtin(".{app}rc", 5, true),
];

/// Detected format of a config file, ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    TypeScript,
    JavaScript,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a file extension (without the dot).
    ///
    /// Extension-less files (`.{app}rc`) are YAML.
    pub fn from_extension(ext: Option<&str>) -> Option<Self> {
        match ext.map(|e| e.to_ascii_lowercase()) {
            None => Some(ConfigFormat::Yaml),
            Some(e) => match e.as_str() {
                "ts" | "mts" | "cts" => Some(ConfigFormat::TypeScript),
                "js" | "mjs" | "cjs" => Some(ConfigFormat::JavaScript),
                "json" => Some(ConfigFormat::Json),
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                _ => None,
            },
        }
    }

    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        Self::from_extension(path.extension().and_then(|e| e.to_str()))
    }

    /// Extensions belonging to this format, in priority order.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ConfigFormat::TypeScript => &["ts", "mts", "cts"],
            ConfigFormat::JavaScript => &["js", "mjs", "cjs"],
            ConfigFormat::Json => &["json"],
            ConfigFormat::Yaml => &["yaml", "yml"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::TypeScript => "typescript",
            ConfigFormat::JavaScript => "javascript",
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every known extension in global priority order.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "mts", "cts", "js", "mjs", "cjs", "json", "yaml", "yml",
];

/// Priority rank of an extension; unknown extensions sort last.
pub fn extension_priority(ext: &str) -> usize {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    DEFAULT_EXTENSIONS
        .iter()
        .position(|known| *known == ext)
        .unwrap_or(DEFAULT_EXTENSIONS.len())
}

/// Substitute the app name and extension into a pattern.
pub fn expand(pattern: &NamingPattern, app_name: &str, ext: Option<&str>) -> String {
    let expanded = pattern.template.replace(APP_SLOT, app_name);
    match ext {
        Some(ext) => expanded.replace(EXT_SLOT, ext.trim_start_matches('.')),
        None => expanded,
    }
}

/// One candidate filename and the pattern that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    pub relative: String,
    pub pattern: NamingPattern,
    pub extension: Option<String>,
}

/// Options for [`discovery_paths`].
#[derive(Debug, Clone)]
pub struct CandidateOptions<'a> {
    pub include_hidden: bool,
    pub patterns: &'a [NamingPattern],
}

impl Default for CandidateOptions<'_> {
    fn default() -> Self {
        Self {
            include_hidden: true,
            patterns: DEFAULT_PATTERNS,
        }
    }
}

/// Ordered candidate filenames for `app_name`.
///
/// Sorted by pattern priority, then extension priority. Patterns without an
/// extension slot contribute a single candidate.
pub fn discovery_paths<S: AsRef<str>>(
    app_name: &str,
    extensions: &[S],
    options: &CandidateOptions<'_>,
) -> Vec<CandidatePath> {
    let mut patterns: Vec<&NamingPattern> = options
        .patterns
        .iter()
        .filter(|p| options.include_hidden || !p.hidden)
        .collect();
    patterns.sort_by_key(|p| p.priority);

    let mut exts: Vec<&str> = extensions.iter().map(|e| e.as_ref()).collect();
    exts.sort_by_key(|e| extension_priority(e));
    exts.dedup();

    let mut candidates = Vec::new();
    for pattern in patterns {
        if pattern.has_extension() {
            for ext in &exts {
                candidates.push(CandidatePath {
                    relative: expand(pattern, app_name, Some(ext)),
                    pattern: pattern.clone(),
                    extension: Some(ext.trim_start_matches('.').to_string()),
                });
            }
        } else {
            candidates.push(CandidatePath {
                relative: expand(pattern, app_name, None),
                pattern: pattern.clone(),
                extension: None,
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        assert_eq!(
            expand(&DEFAULT_PATTERNS[0], "myapp", Some("yaml")),
            "myapp.config.yaml"
        );
        assert_eq!(
            expand(&DEFAULT_PATTERNS[2], "myapp", Some(".json")),
            ".myapp/config.json"
        );
        assert_eq!(expand(&DEFAULT_PATTERNS[4], "myapp", None), ".myapprc");
    }

    #[test]
    fn test_discovery_paths_order() {
        let paths = discovery_paths("app", &["yaml", "json", "ts"], &CandidateOptions::default());
        let names: Vec<&str> = paths.iter().map(|p| p.relative.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "app.config.ts",
                "app.config.json",
                "app.config.yaml",
                "app.conf.ts",
                "app.conf.json",
                "app.conf.yaml",
                ".app/config.ts",
                ".app/config.json",
                ".app/config.yaml",
                ".apprc.ts",
                ".apprc.json",
                ".apprc.yaml",
                ".apprc",
            ]
        );
    }

    #[test]
    fn test_hidden_patterns_excluded() {
        let options = CandidateOptions {
            include_hidden: false,
            ..Default::default()
        };
        let paths = discovery_paths("app", &["json"], &options);
        assert!(paths.iter().all(|p| !p.pattern.hidden));
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_format_detection_and_order() {
        assert_eq!(ConfigFormat::from_extension(Some("MTS")), Some(ConfigFormat::TypeScript));
        assert_eq!(ConfigFormat::from_extension(Some("yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension(None), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension(Some("toml")), None);
        assert!(ConfigFormat::TypeScript < ConfigFormat::JavaScript);
        assert!(ConfigFormat::Json < ConfigFormat::Yaml);
    }

    #[test]
    fn test_custom_pattern_hidden_flag() {
        let pattern = NamingPattern::custom(".config/{app}.{ext}", 6);
        assert!(pattern.hidden);
        assert!(pattern.has_extension());
        assert!(!NamingPattern::custom("{app}.toml", 7).has_extension());
    }
}
