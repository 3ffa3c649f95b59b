//! Run report and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;
use crate::volume::VolumeId;

/// Counters for one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Directories whose files were examined.
    pub directories_visited: u64,
    /// Subtrees abandoned because they could not be listed.
    pub directories_skipped: u64,
    /// Directories excluded by name.
    pub directories_excluded: u64,
    pub files_inserted: u64,
    pub files_updated: u64,
    pub files_unchanged: u64,
    /// Files whose processing failed this run.
    pub files_failed: u64,
    /// On-disk files without an attribute-provider item.
    pub files_uncorrelated: u64,
    /// Files that received the sentinel hash.
    pub files_too_large: u64,
    /// Bytes read by the hasher.
    pub bytes_hashed: u64,
    /// Deepest directory reached below the root.
    pub max_depth: u32,
}

impl WalkStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory whose files were examined.
    pub fn record_dir(&mut self, depth: u32) {
        self.directories_visited += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Number of records written.
    pub fn writes(&self) -> u64 {
        self.files_inserted + self.files_updated
    }

    /// Add another walk's counters into this one.
    pub fn merge(&mut self, other: &WalkStats) {
        self.directories_visited += other.directories_visited;
        self.directories_skipped += other.directories_skipped;
        self.directories_excluded += other.directories_excluded;
        self.files_inserted += other.files_inserted;
        self.files_updated += other.files_updated;
        self.files_unchanged += other.files_unchanged;
        self.files_failed += other.files_failed;
        self.files_uncorrelated += other.files_uncorrelated;
        self.files_too_large += other.files_too_large;
        self.bytes_hashed += other.bytes_hashed;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Result of walking one root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkReport {
    /// Root path that was walked.
    pub root: PathBuf,

    /// Volume the root lives on.
    pub volume_id: VolumeId,

    /// When this walk finished.
    pub finished_at: SystemTime,

    /// Duration of the walk.
    pub duration: Duration,

    /// Summary statistics.
    pub stats: WalkStats,

    /// Isolated failures and diagnostics.
    pub warnings: Vec<ScanWarning>,
}

impl WalkReport {
    /// Create a new report.
    pub fn new(
        root: PathBuf,
        volume_id: VolumeId,
        stats: WalkStats,
        duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            root,
            volume_id,
            finished_at: SystemTime::now(),
            duration,
            stats,
            warnings,
        }
    }

    /// Check if there were any warnings during the walk.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
