//! Index configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::hash::DEFAULT_HASH_SIZE_LIMIT;

/// Directory names never descended into: recycle bins, volume metadata and
/// version-control internals.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "$RECYCLE.BIN",
    "RECYCLER",
    "System Volume Information",
    ".Trash-*",
    "lost+found",
    ".git",
    ".svn",
    ".hg",
    "CVS",
];

/// Configuration for an indexing run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IndexConfig {
    /// Root paths to index.
    #[builder(default)]
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// SQLite database location.
    #[builder(default = "default_database()")]
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Files at or above this many bytes get the sentinel hash.
    #[builder(default = "DEFAULT_HASH_SIZE_LIMIT")]
    #[serde(default = "default_hash_size_limit")]
    pub hash_size_limit: u64,

    /// Directory name globs that are never descended into (case-insensitive).
    #[builder(default = "default_excluded_dirs()")]
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    /// Include entries whose name starts with a dot.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Maximum depth below a root (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Hashing threads (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_true() -> bool {
    true
}

fn default_hash_size_limit() -> u64 {
    DEFAULT_HASH_SIZE_LIMIT
}

fn default_excluded_dirs() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect()
}

/// Default database path under the user's data directory.
pub fn default_database() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filecensus")
        .join("index.db")
}

impl IndexConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match &self.roots {
            Some(roots) if !roots.is_empty() => {}
            _ => return Err("At least one root path is required".to_string()),
        }
        if self.hash_size_limit == Some(0) {
            return Err("hash_size_limit must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl IndexConfig {
    /// Create a new config builder.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Create a simple config for indexing one root into `database`.
    pub fn new(root: impl Into<PathBuf>, database: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            database: database.into(),
            hash_size_limit: DEFAULT_HASH_SIZE_LIMIT,
            excluded_dirs: default_excluded_dirs(),
            include_hidden: true,
            max_depth: None,
            threads: 0,
        }
    }

    /// Load a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        toml::from_str(&raw).map_err(|e| IndexError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Check invariants the builder enforces, for configs built any other way.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.roots.is_empty() {
            return Err(IndexError::InvalidConfig {
                message: "At least one root path is required".to_string(),
            });
        }
        if self.hash_size_limit == 0 {
            return Err(IndexError::InvalidConfig {
                message: "hash_size_limit must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Compile the exclusion globs.
    pub fn directory_filter(&self) -> Result<DirectoryFilter, IndexError> {
        DirectoryFilter::new(&self.excluded_dirs, self.include_hidden)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(".", default_database())
    }
}

/// Compiled name filter for directory and file entries.
#[derive(Debug, Clone)]
pub struct DirectoryFilter {
    excluded: GlobSet,
    include_hidden: bool,
}

impl DirectoryFilter {
    /// Compile `patterns` into a case-insensitive matcher.
    pub fn new(patterns: &[String], include_hidden: bool) -> Result<Self, IndexError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .map_err(|e| IndexError::InvalidConfig {
                    message: format!("bad exclusion pattern {pattern:?}: {e}"),
                })?;
            builder.add(glob);
        }
        let excluded = builder.build().map_err(|e| IndexError::InvalidConfig {
            message: e.to_string(),
        })?;
        Ok(Self {
            excluded,
            include_hidden,
        })
    }

    /// Whether a directory with this name is never descended into.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded.is_match(name) || self.should_skip_hidden(name)
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = IndexConfig::builder()
            .roots(vec![PathBuf::from("/data")])
            .database("/tmp/index.db")
            .threads(4usize)
            .build()
            .unwrap();

        assert_eq!(config.roots, vec![PathBuf::from("/data")]);
        assert_eq!(config.threads, 4);
        assert_eq!(config.hash_size_limit, DEFAULT_HASH_SIZE_LIMIT);
        assert!(config.include_hidden);
    }

    #[test]
    fn test_builder_requires_roots() {
        assert!(IndexConfig::builder().build().is_err());
        assert!(IndexConfig::builder()
            .roots(vec![PathBuf::from("/data")])
            .hash_size_limit(0u64)
            .build()
            .is_err());
    }

    #[test]
    fn test_default_exclusions() {
        let filter = IndexConfig::new("/data", "/tmp/x.db")
            .directory_filter()
            .unwrap();
        assert!(filter.is_excluded_dir("$Recycle.Bin"));
        assert!(filter.is_excluded_dir("System Volume Information"));
        assert!(filter.is_excluded_dir(".git"));
        assert!(filter.is_excluded_dir(".Trash-1000"));
        assert!(!filter.is_excluded_dir("Music"));
        assert!(!filter.is_excluded_dir(".config"));
    }

    #[test]
    fn test_hidden_filter() {
        let filter = DirectoryFilter::new(&[], false).unwrap();
        assert!(filter.is_excluded_dir(".cache"));
        assert!(filter.should_skip_hidden(".profile"));
        assert!(!filter.should_skip_hidden("profile"));
    }

    #[test]
    fn test_load_toml_with_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("filecensus.toml");
        std::fs::write(
            &path,
            "roots = [\"/srv\"]\ndatabase = \"/var/lib/index.db\"\nthreads = 2\n",
        )
        .unwrap();

        let config = IndexConfig::load(&path).unwrap();
        assert_eq!(config.roots, vec![PathBuf::from("/srv")]);
        assert_eq!(config.threads, 2);
        assert_eq!(config.hash_size_limit, DEFAULT_HASH_SIZE_LIMIT);
        assert_eq!(config.excluded_dirs.len(), DEFAULT_EXCLUDED_DIRS.len());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "threads = \"many\"").unwrap();
        assert!(matches!(
            IndexConfig::load(&path),
            Err(IndexError::InvalidConfig { .. })
        ));
    }
}
