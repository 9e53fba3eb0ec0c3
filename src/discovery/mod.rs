//! Config file discovery.
//!
//! - `patterns`: naming conventions and extension priority
//! - `directory`: best match inside a single directory
//! - `ancestors`: the ordered list of directories to search
//! - `hierarchical`: the four discovery modes built on the above

pub mod ancestors;
pub mod directory;
pub mod hierarchical;
pub mod patterns;

pub use ancestors::{AncestorOptions, AncestorWalk, DEFAULT_ROOT_MARKERS, WalkStop, ancestors_of};
pub use directory::{DirectoryDiscovery, DiscoveredConfig, DiscoveryOptions, discover_in_directory};
pub use hierarchical::{
    HIERARCHICAL_KEY, HierarchicalDiscoveryResult, HierarchicalMode, HierarchicalOptions,
    HierarchicalOverrides, discover_hierarchical,
};
pub use patterns::{
    CandidatePath, ConfigFormat, DEFAULT_EXTENSIONS, DEFAULT_PATTERNS, NamingPattern,
    discovery_paths, expand,
};
