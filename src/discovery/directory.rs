//! Config file discovery within one directory.

use super::patterns::{
    CandidateOptions, ConfigFormat, DEFAULT_EXTENSIONS, DEFAULT_PATTERNS, NamingPattern,
    discovery_paths,
};
use crate::logging::Logger;
use crate::security::{SecurityBoundaryChecker, absolutize, is_forbidden_directory};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A located config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredConfig {
    /// Absolute path of the file.
    pub path: PathBuf,
    pub format: ConfigFormat,
    pub pattern: NamingPattern,
    /// Ancestor level of the directory it was found in (0 = start directory).
    pub level: usize,
}

impl DiscoveredConfig {
    /// Directory containing the file.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }
}

/// Options for single-directory discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub app_name: String,
    /// Extensions to try, any order; they are ranked by format priority.
    pub extensions: Vec<String>,
    pub search_hidden: bool,
    pub warn_on_multiple_configs: bool,
    pub patterns: Vec<NamingPattern>,
    pub checker: SecurityBoundaryChecker,
    pub logger: Logger,
}

impl DiscoveryOptions {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            search_hidden: true,
            warn_on_multiple_configs: true,
            patterns: DEFAULT_PATTERNS.to_vec(),
            checker: SecurityBoundaryChecker::default(),
            logger: Logger::new().with_name("discovery"),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_checker(mut self, checker: SecurityBoundaryChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_search_hidden(mut self, search_hidden: bool) -> Self {
        self.search_hidden = search_hidden;
        self
    }

    pub fn with_warn_on_multiple(mut self, warn: bool) -> Self {
        self.warn_on_multiple_configs = warn;
        self
    }
}

/// Outcome of searching one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryDiscovery {
    pub config: Option<DiscoveredConfig>,
    /// Set when more than one candidate exists (unless warnings are suppressed).
    pub multiple_config_warning: bool,
    /// Existing candidates that lost to `config`.
    pub shadowed: Vec<PathBuf>,
}

/// Find the highest-priority config file in `directory`.
///
/// Not finding anything is a normal outcome. Candidates rejected by the
/// boundary checker are skipped, never stat'd.
pub async fn discover_in_directory(
    directory: &Path,
    options: &DiscoveryOptions,
) -> DirectoryDiscovery {
    discover_at_level(&absolutize(directory), 0, options).await
}

pub(crate) async fn discover_at_level(
    directory: &Path,
    level: usize,
    options: &DiscoveryOptions,
) -> DirectoryDiscovery {
    if is_forbidden_directory(directory) {
        debug!(dir = %directory.display(), "forbidden directory not searched");
        return DirectoryDiscovery::default();
    }
    if !options.checker.permits_directory(directory) {
        debug!(dir = %directory.display(), "directory outside allowed bases not searched");
        return DirectoryDiscovery::default();
    }

    let candidates = discovery_paths(
        &options.app_name,
        &options.extensions,
        &CandidateOptions {
            include_hidden: options.search_hidden,
            patterns: &options.patterns,
        },
    );
    let checker = options.checker.scoped_to(directory, options.search_hidden);

    let mut found: Vec<DiscoveredConfig> = Vec::new();
    for candidate in candidates {
        let validated = match checker.validate_async(&candidate.relative, "discover").await {
            Ok(validated) => validated,
            Err(err) => {
                options
                    .logger
                    .warning(&format!("skipping config candidate: {err}"));
                continue;
            }
        };

        let is_file = tokio::fs::metadata(&validated.resolved)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        let Some(format) =
            ConfigFormat::from_extension(candidate.extension.as_deref())
        else {
            debug!(path = %validated.resolved.display(), "unrecognized config extension");
            continue;
        };

        found.push(DiscoveredConfig {
            path: validated.resolved,
            format,
            pattern: candidate.pattern,
            level,
        });
    }

    let mut found = found.into_iter();
    let config = found.next();
    let shadowed: Vec<PathBuf> = found.map(|c| c.path).collect();
    let multiple_config_warning = options.warn_on_multiple_configs && !shadowed.is_empty();

    if let Some(ref winner) = config {
        debug!(
            path = %winner.path.display(),
            priority = winner.pattern.priority,
            "found config file"
        );
        if multiple_config_warning {
            let ignored: Vec<String> = shadowed.iter().map(|p| p.display().to_string()).collect();
            options.logger.warning(&format!(
                "multiple config files found in {}; using {} and ignoring {}",
                directory.display(),
                winner.path.display(),
                ignored.join(", ")
            ));
        }
    }

    DirectoryDiscovery {
        config,
        multiple_config_warning,
        shadowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemorySink};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_nothing_found_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let result = discover_in_directory(temp.path(), &DiscoveryOptions::new("myapp")).await;
        assert!(result.config.is_none());
        assert!(!result.multiple_config_warning);
    }

    #[tokio::test]
    async fn test_priority_wins_and_warns() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("myapp.config.yaml"), "a: 1").unwrap();
        std::fs::write(temp.path().join(".myapprc"), "a: 2").unwrap();
        let sink = Arc::new(MemorySink::new());
        let options = DiscoveryOptions::new("myapp")
            .with_logger(Logger::new().with_sink(sink.clone()));

        let result = discover_in_directory(temp.path(), &options).await;
        let config = result.config.unwrap();
        assert_eq!(config.path, temp.path().join("myapp.config.yaml"));
        assert_eq!(config.format, ConfigFormat::Yaml);
        assert_eq!(config.pattern.priority, 1);
        assert!(result.multiple_config_warning);
        assert_eq!(result.shadowed, vec![temp.path().join(".myapprc")]);
        assert_eq!(sink.messages_at(LogLevel::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_extension_priority_within_pattern() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("myapp.config.yaml"), "a: 1").unwrap();
        std::fs::write(temp.path().join("myapp.config.json"), "{}").unwrap();
        let options = DiscoveryOptions::new("myapp").with_warn_on_multiple(false);

        let result = discover_in_directory(temp.path(), &options).await;
        assert_eq!(result.config.unwrap().format, ConfigFormat::Json);
        assert!(!result.multiple_config_warning);
    }

    #[tokio::test]
    async fn test_hidden_search_disabled() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".myapp")).unwrap();
        std::fs::write(temp.path().join(".myapp/config.json"), "{}").unwrap();

        let hidden = discover_in_directory(temp.path(), &DiscoveryOptions::new("myapp")).await;
        assert_eq!(
            hidden.config.unwrap().path,
            temp.path().join(".myapp").join("config.json")
        );

        let visible_only = DiscoveryOptions::new("myapp").with_search_hidden(false);
        let result = discover_in_directory(temp.path(), &visible_only).await;
        assert!(result.config.is_none());
    }

    #[tokio::test]
    async fn test_directory_named_like_config_is_ignored() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("myapp.config.json")).unwrap();
        let result = discover_in_directory(temp.path(), &DiscoveryOptions::new("myapp")).await;
        assert!(result.config.is_none());
    }
}
