//! Walk progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Progress information during a walk.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Files examined so far (written or unchanged).
    pub files_seen: u64,
    /// Files inserted or updated so far.
    pub files_written: u64,
    /// Directories whose files were examined.
    pub dirs_visited: u64,
    /// Bytes read by the hasher.
    pub bytes_hashed: u64,
    /// Directory being indexed.
    pub current_path: PathBuf,
    /// Number of warnings so far.
    pub warnings_count: u64,
    /// Time elapsed since the walk started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_seen: 0,
            files_written: 0,
            dirs_visited: 0,
            bytes_hashed: 0,
            current_path: PathBuf::new(),
            warnings_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Files examined per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_seen as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Hashing throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_hashed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Running counters behind the published snapshots.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    current: ScanProgress,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            current: ScanProgress::new(),
        }
    }

    pub fn record_files(&mut self, seen: u64, written: u64, bytes_hashed: u64) {
        self.current.files_seen += seen;
        self.current.files_written += written;
        self.current.bytes_hashed += bytes_hashed;
    }

    pub fn record_dir(&mut self, path: PathBuf) {
        self.current.dirs_visited += 1;
        self.current.current_path = path;
    }

    pub fn record_warnings(&mut self, count: u64) {
        self.current.warnings_count += count;
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            elapsed: self.start_time.elapsed(),
            ..self.current.clone()
        }
    }
}
