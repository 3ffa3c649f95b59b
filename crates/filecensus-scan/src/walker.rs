//! Incremental depth-first tree walker.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

use compact_str::CompactString;
use rayon::ThreadPool;
use rayon::prelude::*;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use filecensus_core::{
    AttributeValue, DirectoryFilter, DirectoryId, FileHash, FileId, FileUpdate, IndexConfig,
    IndexError, IndexStore, NewFile, ScanWarning, Timestamps, Volume, VolumeId, WalkReport,
    WalkStats, WarningKind,
};

use crate::catalog::AttributeCatalog;
use crate::context::ScanContext;
use crate::detect::{ChangeDetector, DiskEntry, WorkItem};
use crate::hasher::hash_with_limit;
use crate::progress::{ProgressTracker, ScanProgress};
use crate::provider::{AttributeProvider, DirectoryListing, ItemHandle};
use crate::resolver::DirectoryResolver;

/// Result of visiting one directory.
#[derive(Debug)]
pub enum DirectoryOutcome {
    /// Files were examined; these subdirectories come next.
    Indexed { subdirectories: Vec<PathBuf> },
    /// The directory could not be listed or resolved; its subtree is
    /// abandoned.
    Skipped(ScanWarning),
}

/// Result of processing one file that needed work.
#[derive(Debug)]
pub enum FileOutcome {
    Inserted(FileId),
    Updated(FileId),
    Failed(ScanWarning),
}

/// What one `read_dir` pass found.
#[derive(Debug, Default)]
struct DirectoryScan {
    files: Vec<DiskEntry>,
    subdirectories: Vec<PathBuf>,
    excluded: u64,
    warnings: Vec<ScanWarning>,
}

/// A work item with its attributes captured, ready to hash.
struct Prepared {
    work: WorkItem,
    attributes: Vec<AttributeValue>,
}

/// Walks directory trees and keeps the store in step with them.
///
/// The walking thread is the only writer: it lists, resolves, detects,
/// captures attributes and persists. Hashing of one directory's files runs
/// on a dedicated rayon pool.
pub struct IndexWalker<'a, S: ?Sized, P> {
    store: &'a S,
    provider: &'a P,
    filter: DirectoryFilter,
    hash_size_limit: u64,
    max_depth: Option<u32>,
    detector: ChangeDetector,
    pool: ThreadPool,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl<'a, S, P> IndexWalker<'a, S, P>
where
    S: IndexStore + ?Sized,
    P: AttributeProvider,
{
    pub fn new(store: &'a S, provider: &'a P, config: &IndexConfig) -> Result<Self, IndexError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("filecensus-hash-{i}"))
            .build()
            .map_err(|e| IndexError::InvalidConfig {
                message: format!("hash pool: {e}"),
            })?;
        let (progress_tx, _) = broadcast::channel(100);

        Ok(Self {
            store,
            provider,
            filter: config.directory_filter()?,
            hash_size_limit: config.hash_size_limit,
            max_depth: config.max_depth,
            detector: ChangeDetector::new(),
            pool,
            progress_tx,
        })
    }

    /// Subscribe to walk progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    pub fn provider(&self) -> &'a P {
        self.provider
    }

    /// Walk `root` on `volume` in pre-order. Only fatal store errors and an
    /// unusable root are returned as errors.
    pub fn walk(
        &self,
        ctx: &mut ScanContext,
        volume: &Volume,
        root: &Path,
    ) -> Result<WalkReport, IndexError> {
        let start = Instant::now();
        let metadata = fs::metadata(root).map_err(|e| IndexError::io(root, e))?;
        if !metadata.is_dir() {
            return Err(IndexError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        if !volume.contains(root) {
            return Err(IndexError::PathOutsideVolume {
                path: root.to_path_buf(),
                volume: volume.facts.letter.clone(),
            });
        }

        info!(root = %root.display(), volume = volume.id.0, "Walking");
        let resolver = DirectoryResolver::new(self.store);
        let mut stats = WalkStats::new();
        let mut warnings = Vec::new();
        let mut tracker = ProgressTracker::new();
        let mut stack = vec![(root.to_path_buf(), 0u32)];

        while let Some((dir, depth)) = stack.pop() {
            let before = stats.clone();
            let warnings_before = warnings.len();

            let outcome = self.index_directory(
                ctx,
                &resolver,
                volume,
                &dir,
                &mut stats,
                &mut warnings,
            )?;
            match outcome {
                DirectoryOutcome::Indexed { subdirectories } => {
                    stats.record_dir(depth);
                    let next = depth + 1;
                    if self.max_depth.is_none_or(|max| next <= max) {
                        stack.extend(subdirectories.into_iter().rev().map(|sub| (sub, next)));
                    }
                    tracker.record_dir(dir);
                }
                DirectoryOutcome::Skipped(warning) => {
                    warn!(path = %warning.path.display(), "Skipping subtree: {}", warning.message);
                    stats.directories_skipped += 1;
                    warnings.push(warning);
                }
            }

            tracker.record_files(
                files_seen(&stats) - files_seen(&before),
                stats.writes() - before.writes(),
                stats.bytes_hashed - before.bytes_hashed,
            );
            tracker.record_warnings((warnings.len() - warnings_before) as u64);
            let _ = self.progress_tx.send(tracker.snapshot());
        }

        let report = WalkReport::new(
            root.to_path_buf(),
            volume.id,
            stats,
            start.elapsed(),
            warnings,
        );
        info!(
            root = %root.display(),
            inserted = report.stats.files_inserted,
            updated = report.stats.files_updated,
            unchanged = report.stats.files_unchanged,
            failed = report.stats.files_failed,
            skipped_dirs = report.stats.directories_skipped,
            "Walk finished in {:?}",
            report.duration
        );
        Ok(report)
    }

    /// Index the files of `dir`.
    fn index_directory(
        &self,
        ctx: &mut ScanContext,
        resolver: &DirectoryResolver<'_, S>,
        volume: &Volume,
        dir: &Path,
        stats: &mut WalkStats,
        warnings: &mut Vec<ScanWarning>,
    ) -> Result<DirectoryOutcome, IndexError> {
        let scan = match self.scan_directory(dir) {
            Ok(scan) => scan,
            Err(error) => return Ok(DirectoryOutcome::Skipped(ScanWarning::from_error(dir, &error))),
        };
        stats.directories_excluded += scan.excluded;
        warnings.extend(scan.warnings);

        let directory_id = match resolver.resolve(ctx, volume, dir) {
            Ok(id) => id,
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => return Ok(DirectoryOutcome::Skipped(ScanWarning::from_error(dir, &error))),
        };

        if let Err(error) =
            self.index_files(ctx.catalog(), volume.id, directory_id, dir, scan.files, stats, warnings)
        {
            if error.is_fatal() {
                return Err(error);
            }
            warn!(path = %dir.display(), %error, "Files not indexed");
            warnings.push(ScanWarning::from_error(dir, &error));
        }

        Ok(DirectoryOutcome::Indexed {
            subdirectories: scan.subdirectories,
        })
    }

    /// List `dir`, splitting files from subdirectories. Symlinks are
    /// neither indexed nor followed.
    fn scan_directory(&self, dir: &Path) -> Result<DirectoryScan, IndexError> {
        let entries = fs::read_dir(dir).map_err(|e| IndexError::io(dir, e))?;
        let mut scan = DirectoryScan::default();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    scan.warnings
                        .push(ScanWarning::new(dir, err.to_string(), WarningKind::ReadError));
                    continue;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    scan.warnings
                        .push(ScanWarning::new(&path, err.to_string(), WarningKind::MetadataError));
                    continue;
                }
            };

            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                if self.filter.is_excluded_dir(&name) {
                    debug!(path = %path.display(), "Excluded directory");
                    scan.excluded += 1;
                } else {
                    scan.subdirectories.push(path);
                }
                continue;
            }
            if !file_type.is_file() || self.filter.should_skip_hidden(&name) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    scan.warnings
                        .push(ScanWarning::new(&path, err.to_string(), WarningKind::MetadataError));
                    continue;
                }
            };
            scan.files.push(DiskEntry {
                name: CompactString::from(name),
                path,
                length: metadata.len(),
                timestamps: Timestamps::from_system(
                    metadata.modified().unwrap_or(UNIX_EPOCH),
                    metadata.created().ok(),
                ),
            });
        }

        scan.files.sort_by(|a, b| a.name.cmp(&b.name));
        scan.subdirectories.sort();
        Ok(scan)
    }

    /// Detect, capture attributes, hash and persist one directory's files.
    /// Errors returned here affect the whole directory; per-file failures
    /// are recorded as [`FileOutcome::Failed`].
    #[allow(clippy::too_many_arguments)]
    fn index_files(
        &self,
        catalog: &AttributeCatalog,
        volume: VolumeId,
        directory: DirectoryId,
        dir: &Path,
        files: Vec<DiskEntry>,
        stats: &mut WalkStats,
        warnings: &mut Vec<ScanWarning>,
    ) -> Result<(), IndexError> {
        let stored = self.store.list_files(volume, directory)?;
        let listing = self.provider.open_directory(dir)?;
        let items = listing.items(false)?;
        let changes = self.detector.detect(&stored, files, &items);

        stats.files_unchanged += changes.unchanged.len() as u64;
        for entry in changes.collisions {
            debug!(path = %entry.path.display(), "Case-insensitive name collision");
            warnings.push(ScanWarning::new(
                entry.path,
                "Name differs only by case from an earlier file",
                WarningKind::NameCollision,
            ));
        }
        for entry in changes.uncorrelated {
            debug!(path = %entry.path.display(), "No attribute item");
            stats.files_uncorrelated += 1;
            warnings.push(ScanWarning::uncorrelated(entry.path));
        }
        if changes.work.is_empty() {
            return Ok(());
        }

        let mut prepared = Vec::with_capacity(changes.work.len());
        for work in changes.work {
            match capture_attributes(&listing, catalog, &work.item) {
                Ok(attributes) => prepared.push(Prepared { work, attributes }),
                Err(error) => record(
                    FileOutcome::Failed(ScanWarning::from_error(&work.entry.path, &error)),
                    stats,
                    warnings,
                ),
            }
        }

        let limit = self.hash_size_limit;
        let hashes: Vec<_> = self.pool.install(|| {
            prepared
                .par_iter()
                .map(|p| hash_with_limit(&p.work.entry.path, p.work.entry.length, limit))
                .collect()
        });

        for (prepared, hash) in prepared.into_iter().zip(hashes) {
            let outcome = match hash {
                Ok(hash) => {
                    match hash {
                        FileHash::Digest(_) => stats.bytes_hashed += prepared.work.entry.length,
                        FileHash::TooLarge => stats.files_too_large += 1,
                    }
                    self.persist(volume, directory, prepared, hash)?
                }
                Err(error) => {
                    let path = &prepared.work.entry.path;
                    FileOutcome::Failed(ScanWarning::from_error(path, &IndexError::io(path, error)))
                }
            };
            record(outcome, stats, warnings);
        }
        Ok(())
    }

    /// Write one file and its attribute set. Only fatal errors propagate.
    fn persist(
        &self,
        volume: VolumeId,
        directory: DirectoryId,
        prepared: Prepared,
        hash: FileHash,
    ) -> Result<FileOutcome, IndexError> {
        let Prepared { work, attributes } = prepared;
        let entry = &work.entry;

        let result = match &work.existing {
            None => self
                .store
                .insert_file(
                    &NewFile {
                        volume_id: volume,
                        directory_id: directory,
                        name: entry.name.clone(),
                        timestamps: entry.timestamps,
                        length: entry.length,
                        hash,
                    },
                    &attributes,
                )
                .map(FileOutcome::Inserted),
            Some(record) => self
                .store
                .update_file(
                    record.id,
                    &FileUpdate {
                        timestamps: entry.timestamps,
                        length: entry.length,
                        hash,
                    },
                    &attributes,
                )
                .map(|()| FileOutcome::Updated(record.id)),
        };

        match result {
            Ok(outcome) => {
                info!(path = %entry.path.display(), kind = ?work.kind, %hash, "Indexed file");
                Ok(outcome)
            }
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => Ok(FileOutcome::Failed(ScanWarning::from_error(
                &entry.path,
                &error,
            ))),
        }
    }
}

/// Read every catalog column for `item`. Blank values are not stored.
fn capture_attributes<L: DirectoryListing>(
    listing: &L,
    catalog: &AttributeCatalog,
    item: &ItemHandle,
) -> Result<Vec<AttributeValue>, IndexError> {
    let mut values = Vec::with_capacity(catalog.headers().len());
    for header in catalog.headers() {
        let value = listing.detail(item, header.index)?;
        if value.trim().is_empty() {
            continue;
        }
        values.push(AttributeValue::new(header.id, value));
    }
    Ok(values)
}

fn record(outcome: FileOutcome, stats: &mut WalkStats, warnings: &mut Vec<ScanWarning>) {
    match outcome {
        FileOutcome::Inserted(_) => stats.files_inserted += 1,
        FileOutcome::Updated(_) => stats.files_updated += 1,
        FileOutcome::Failed(warning) => {
            warn!(path = %warning.path.display(), "File skipped: {}", warning.message);
            stats.files_failed += 1;
            warnings.push(warning);
        }
    }
}

fn files_seen(stats: &WalkStats) -> u64 {
    stats.writes() + stats.files_unchanged + stats.files_failed
}
