//! Filesystem security boundary checks.
//!
//! Every candidate path passes through [`SecurityBoundaryChecker::validate`]
//! before discovery stats it or a loader reads it. The checker:
//! - Collects every violation instead of stopping at the first
//! - Pattern-matches traversal on the raw input (including URL-encoded forms)
//! - Normalizes `.` and `..` lexically (no filesystem I/O for checks 1-8)
//! - Only touches the filesystem (symlink resolution) once the pure checks pass
//!
//! It also exposes the directory denylist that ancestor walks must never
//! enter, plus the hard depth ceilings.

use crate::error::{
    ConfigError, ConfigResult, SecurityCode, SecurityError, SecurityValidationError,
};
use regex_lite::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// Default maximum accepted path length in characters.
pub const DEFAULT_MAX_PATH_LENGTH: usize = 500;

/// Maximum number of components below the filesystem root a searched
/// directory may have.
pub const MAX_ABSOLUTE_DEPTH: usize = 20;

/// Maximum number of directory levels a walk may cover from its start.
pub const MAX_RELATIVE_DEPTH: usize = 10;

/// Normalization dropping more than this many segments counts as an escape.
const MAX_SEGMENT_DROP: usize = 2;

/// System directories that discovery never enters.
#[cfg(unix)]
pub const FORBIDDEN_SYSTEM_DIRECTORIES: &[&str] = &[
    "/etc",
    "/sys",
    "/proc",
    "/dev",
    "/boot",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/var/run",
    "/System",
    "/private/etc",
];
#[cfg(windows)]
pub const FORBIDDEN_SYSTEM_DIRECTORIES: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData\\Microsoft",
];
#[cfg(not(any(unix, windows)))]
pub const FORBIDDEN_SYSTEM_DIRECTORIES: &[&str] = &[];

/// Credential directories (relative to the home directory) that discovery
/// never enters.
pub const FORBIDDEN_HOME_DIRECTORIES: &[&str] = &[
    ".ssh",
    ".gnupg",
    ".aws",
    ".azure",
    ".kube",
    ".docker",
    ".config/gcloud",
];

fn traversal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // A dot is `.`, `%2e` or `%252e`; a separator is `/`, `\`, or their
        // single/double encodings. Any mix of the two forms is matched.
        Regex::new(
            r"(?i)(?:\.|%2e|%252e)(?:\.|%2e|%252e)(?:/|\\|%2f|%5c|%252f|%255c)|(?:^|/|\\)(?:\.|%2e|%252e){2}$",
        )
        .expect("traversal pattern is valid")
    })
}

fn drive_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z]:[\\/]").expect("drive pattern is valid"))
}

/// Policy for [`SecurityBoundaryChecker`].
#[derive(Debug, Clone)]
pub struct SecurityOptions {
    pub max_path_length: usize,
    pub allow_absolute: bool,
    pub allow_hidden: bool,
    /// Lowercase extensions without the leading dot. `None` allows any.
    pub allowed_extensions: Option<Vec<String>>,
    /// Resolved paths must stay inside one of these when non-empty.
    pub allowed_base_dirs: Vec<PathBuf>,
    pub validate_symlinks: bool,
    /// Directory relative candidates are resolved against.
    pub base_directory: PathBuf,
    /// Tag recorded on every violation (e.g. `discovery`, `cli`).
    pub source: String,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            allow_absolute: false,
            allow_hidden: false,
            allowed_extensions: None,
            allowed_base_dirs: Vec::new(),
            validate_symlinks: true,
            base_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            source: "config".to_string(),
        }
    }
}

impl SecurityOptions {
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = Some(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        );
        self
    }

    pub fn with_allowed_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.allowed_base_dirs.push(dir.into());
        self
    }

    pub fn with_base_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_directory = dir.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// A path that passed every boundary check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    /// Lexically normalized form of the input.
    pub normalized: PathBuf,
    /// Absolute form resolved against the base directory.
    pub resolved: PathBuf,
}

/// Validates candidate paths against a [`SecurityOptions`] policy.
///
/// Construct one and pass it down; it holds no mutable state.
#[derive(Debug, Clone, Default)]
pub struct SecurityBoundaryChecker {
    options: SecurityOptions,
}

impl SecurityBoundaryChecker {
    pub fn new(options: SecurityOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SecurityOptions {
        &self.options
    }

    /// Derive a checker that resolves relative candidates inside `directory`.
    ///
    /// Configured allowed base directories stay in force; without any, the
    /// candidate must stay inside `directory`. `allow_hidden` lets the caller
    /// admit dot-prefixed conventions such as `.{app}rc`.
    pub fn scoped_to(&self, directory: &Path, allow_hidden: bool) -> Self {
        let mut options = self.options.clone();
        options.base_directory = directory.to_path_buf();
        if options.allowed_base_dirs.is_empty() {
            options.allowed_base_dirs = vec![directory.to_path_buf()];
        }
        options.allow_hidden = options.allow_hidden || allow_hidden;
        Self { options }
    }

    /// Whether `directory` lies inside the configured allowed base
    /// directories. Always true when none are configured.
    pub fn permits_directory(&self, directory: &Path) -> bool {
        self.options.allowed_base_dirs.is_empty()
            || within_any(
                &normalize_path_components(directory),
                &self.options.allowed_base_dirs,
            )
    }

    /// Run all boundary checks on `candidate`.
    ///
    /// Checks 1-8 are pure and always all run. The symlink check (9) only runs
    /// when nothing else failed, so a rejected path is never stat'd.
    pub fn validate(&self, candidate: &str, operation: &str) -> Result<ValidatedPath, SecurityError> {
        let opts = &self.options;
        let mut errors = Vec::new();
        let violation = |code: SecurityCode, message: String| SecurityValidationError {
            field: operation.to_string(),
            message,
            code,
            value: Some(truncate_for_report(candidate)),
            source: opts.source.clone(),
        };

        // 1. Null and control characters.
        if candidate.chars().any(|c| c.is_control()) {
            errors.push(violation(
                SecurityCode::PathTraversal,
                "path contains null or control characters".to_string(),
            ));
        }

        // 2. Length.
        let length = candidate.chars().count();
        if length > opts.max_path_length {
            errors.push(violation(
                SecurityCode::PathTooLong,
                format!(
                    "path length {} exceeds maximum of {}",
                    length, opts.max_path_length
                ),
            ));
        }

        // 3. Raw traversal sequences, matched on the unmodified input.
        if traversal_pattern().is_match(candidate) {
            errors.push(violation(
                SecurityCode::PathTraversal,
                format!(
                    "path contains a traversal sequence (decoded: {})",
                    fully_decode(candidate)
                ),
            ));
        }

        // 4. Absolute paths.
        let absolute = is_absolute_str(candidate);
        if absolute && !opts.allow_absolute {
            errors.push(violation(
                SecurityCode::PathAbsoluteNotAllowed,
                "absolute paths are not allowed".to_string(),
            ));
        }

        // 5. Normalize, then compare segment counts.
        let normalized = normalize_path_components(Path::new(candidate));
        let raw_segments = candidate
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .count();
        let normalized_segments = normalized
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count();
        if raw_segments.saturating_sub(normalized_segments) > MAX_SEGMENT_DROP {
            errors.push(violation(
                SecurityCode::PathTraversal,
                format!(
                    "normalization removed {} path segments",
                    raw_segments - normalized_segments
                ),
            ));
        }
        let resolved = if absolute {
            normalized.clone()
        } else {
            normalize_path_components(&opts.base_directory.join(&normalized))
        };

        // 6. Hidden segments.
        if !opts.allow_hidden && has_hidden_segment(&normalized) {
            errors.push(violation(
                SecurityCode::PathHiddenFile,
                "hidden (dot-prefixed) path segments are not allowed".to_string(),
            ));
        }

        // 7. Extension allow-list.
        if let Some(ref allowed) = opts.allowed_extensions {
            let ext = normalized
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            if !allowed.iter().any(|a| *a == ext) {
                errors.push(violation(
                    SecurityCode::PathInvalidExtension,
                    format!(
                        "extension '{}' is not in the allowed list [{}]",
                        ext,
                        allowed.join(", ")
                    ),
                ));
            }
        }

        // 8. Base directory containment.
        if !opts.allowed_base_dirs.is_empty() && !within_any(&resolved, &opts.allowed_base_dirs) {
            errors.push(violation(
                SecurityCode::PathOutsideAllowed,
                format!(
                    "{} is outside the allowed directories",
                    resolved.display()
                ),
            ));
        }

        // 9. Symlink escape.
        if errors.is_empty() && opts.validate_symlinks && !opts.allowed_base_dirs.is_empty() {
            if let Some(real) = real_path_if_exists(&resolved) {
                let bases: Vec<PathBuf> = opts
                    .allowed_base_dirs
                    .iter()
                    .map(|b| b.canonicalize().unwrap_or_else(|_| normalize_path_components(b)))
                    .collect();
                if !within_any(&real, &bases) {
                    errors.push(violation(
                        SecurityCode::PathSymlinkEscape,
                        format!(
                            "{} resolves to {} outside the allowed directories",
                            resolved.display(),
                            real.display()
                        ),
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(ValidatedPath {
                normalized,
                resolved,
            })
        } else {
            Err(SecurityError {
                operation: operation.to_string(),
                errors,
            })
        }
    }

    /// [`validate`](Self::validate) on the blocking pool.
    ///
    /// The symlink check stats the filesystem, so async callers use this.
    pub async fn validate_async(
        &self,
        candidate: &str,
        operation: &str,
    ) -> ConfigResult<ValidatedPath> {
        let checker = self.clone();
        let (owned, op) = (candidate.to_string(), operation.to_string());
        tokio::task::spawn_blocking(move || checker.validate(&owned, &op))
            .await
            .map_err(|e| ConfigError::io(candidate, std::io::Error::other(e)))?
            .map_err(ConfigError::from)
    }
}

/// Whether an ancestor walk must stop before entering `dir`.
///
/// True for the system and credential denylists and for directories deeper
/// than [`MAX_ABSOLUTE_DEPTH`].
pub fn is_forbidden_directory(dir: &Path) -> bool {
    let normalized = normalize_path_components(dir);
    let depth = normalized
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    if depth > MAX_ABSOLUTE_DEPTH {
        return true;
    }

    if FORBIDDEN_SYSTEM_DIRECTORIES
        .iter()
        .any(|forbidden| normalized.starts_with(forbidden))
    {
        return true;
    }

    if let Some(home) = dirs::home_dir() {
        let home = normalize_path_components(&home);
        if FORBIDDEN_HOME_DIRECTORIES
            .iter()
            .any(|rel| normalized.starts_with(home.join(rel)))
        {
            return true;
        }
    }

    false
}

fn is_absolute_str(candidate: &str) -> bool {
    Path::new(candidate).is_absolute()
        || candidate.starts_with('/')
        || candidate.starts_with('\\')
        || drive_prefix_pattern().is_match(candidate)
}

fn has_hidden_segment(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn within_any(path: &Path, bases: &[PathBuf]) -> bool {
    bases
        .iter()
        .any(|base| path.starts_with(normalize_path_components(base)))
}

fn real_path_if_exists(path: &Path) -> Option<PathBuf> {
    std::fs::symlink_metadata(path).ok()?;
    path.canonicalize().ok()
}

/// Decode up to two levels of URL encoding for error reporting.
fn fully_decode(candidate: &str) -> String {
    let once = urlencoding::decode(candidate)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| candidate.to_string());
    urlencoding::decode(&once)
        .map(|s| s.into_owned())
        .unwrap_or(once)
}

fn truncate_for_report(candidate: &str) -> String {
    const LIMIT: usize = 120;
    if candidate.chars().count() <= LIMIT {
        candidate.to_string()
    } else {
        let head: String = candidate.chars().take(LIMIT).collect();
        format!("{head}...")
    }
}

/// Absolute, lexically normalized form of `path`, resolved against the
/// process working directory when relative.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize_path_components(&joined)
}

/// Normalize path components without requiring the file to exist.
/// Handles `.` and `..` components.
pub(crate) fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => {
                components.push(Component::Prefix(p));
            }
            Component::RootDir => {
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                match components.last() {
                    Some(Component::Normal(_)) => {
                        components.pop();
                    }
                    // `/..` is `/`
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => components.push(Component::ParentDir),
                }
            }
            Component::Normal(name) => {
                components.push(Component::Normal(name));
            }
        }
    }

    components.iter().collect()
}
