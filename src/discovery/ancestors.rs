//! Ancestor directory walk with root-marker and stop-directory detection.

use crate::security::{MAX_RELATIVE_DEPTH, absolutize, is_forbidden_directory};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files or directories whose presence marks a project root.
pub const DEFAULT_ROOT_MARKERS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "package.json",
    "pnpm-workspace.yaml",
    "lerna.json",
    "nx.json",
    "rush.json",
    "Cargo.toml",
    "go.mod",
    "pyproject.toml",
];

/// Default number of directories a walk covers.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Options for [`ancestors_of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorOptions {
    /// Directories to visit, the start directory included. Clamped to
    /// [`MAX_RELATIVE_DEPTH`].
    pub max_depth: usize,
    pub root_markers: Vec<String>,
    /// Directory names that end the walk (inclusive).
    pub stop_at: Vec<String>,
    pub stop_at_root: bool,
}

impl Default for AncestorOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            root_markers: DEFAULT_ROOT_MARKERS.iter().map(|m| m.to_string()).collect(),
            stop_at: Vec::new(),
            stop_at_root: true,
        }
    }
}

/// Why a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    MaxDepth,
    StopDirectory,
    RootMarker,
    FilesystemRoot,
    Forbidden,
}

/// Ordered ancestor list, most specific first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorWalk {
    pub directories: Vec<PathBuf>,
    pub stopped_by: WalkStop,
}

/// Directories from `start` outward to search for config files.
///
/// `start` is included first. A forbidden directory ends the walk before it
/// is added; every other stop condition includes the directory it fires on.
pub async fn ancestors_of(start: &Path, options: &AncestorOptions) -> AncestorWalk {
    let start = absolutize(start);
    let limit = options.max_depth.clamp(1, MAX_RELATIVE_DEPTH);

    let mut directories = Vec::new();
    let mut current = Some(start.as_path());
    let mut stopped_by = WalkStop::FilesystemRoot;

    while let Some(dir) = current {
        if is_forbidden_directory(dir) {
            debug!(dir = %dir.display(), "ancestor walk stopped at forbidden directory");
            stopped_by = WalkStop::Forbidden;
            break;
        }
        directories.push(dir.to_path_buf());

        if directories.len() >= limit {
            stopped_by = WalkStop::MaxDepth;
            break;
        }
        if is_stop_directory(dir, &options.stop_at) {
            stopped_by = WalkStop::StopDirectory;
            break;
        }
        if options.stop_at_root && has_root_marker(dir, &options.root_markers).await {
            debug!(dir = %dir.display(), "ancestor walk stopped at project root");
            stopped_by = WalkStop::RootMarker;
            break;
        }
        current = dir.parent();
    }

    AncestorWalk {
        directories,
        stopped_by,
    }
}

fn is_stop_directory(dir: &Path, stop_at: &[String]) -> bool {
    dir.file_name()
        .map(|name| stop_at.iter().any(|s| name == s.as_str()))
        .unwrap_or(false)
}

async fn has_root_marker(dir: &Path, markers: &[String]) -> bool {
    for marker in markers {
        if tokio::fs::try_exists(dir.join(marker)).await.unwrap_or(false) {
            return true;
        }
    }
    false
}
