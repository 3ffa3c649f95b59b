//! Change detection between stored records and the current listing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use compact_str::CompactString;

use filecensus_core::{FileRecord, Timestamps, fold_case};

use crate::provider::ItemHandle;

/// A file as currently found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    pub name: CompactString,
    pub path: PathBuf,
    pub length: u64,
    pub timestamps: Timestamps,
}

/// Why a file needs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Changed,
}

/// A file that must be hashed, have its attributes captured and be written.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub entry: DiskEntry,
    /// The stored record to overwrite, `None` for new files.
    pub existing: Option<FileRecord>,
    pub item: ItemHandle,
    pub kind: ChangeKind,
}

/// Partition of one directory's files.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// New and changed files, in listing order.
    pub work: Vec<WorkItem>,
    pub unchanged: Vec<DiskEntry>,
    /// Files needing work that have no provider item.
    pub uncorrelated: Vec<DiskEntry>,
    /// Files whose name folds onto an earlier entry's name.
    pub collisions: Vec<DiskEntry>,
}

impl ChangeSet {
    /// Whether nothing in the directory needs work.
    pub fn is_clean(&self) -> bool {
        self.work.is_empty() && self.uncorrelated.is_empty()
    }
}

/// Whether `entry` diverges from `record` in length or whole-second
/// timestamps.
pub fn has_changed(record: &FileRecord, entry: &DiskEntry) -> bool {
    record.length != entry.length || !record.timestamps.same_second(&entry.timestamps)
}

/// Stateless comparison of stored records against a listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify `entries` against `stored`. Provider `items` are matched
    /// by case-insensitive name.
    pub fn detect(
        &self,
        stored: &[FileRecord],
        entries: Vec<DiskEntry>,
        items: &[ItemHandle],
    ) -> ChangeSet {
        let by_name: HashMap<String, &FileRecord> = stored
            .iter()
            .map(|record| (fold_case(&record.name), record))
            .collect();
        let items: HashMap<String, &ItemHandle> = items
            .iter()
            .filter(|item| !item.is_dir)
            .map(|item| (fold_case(&item.name), item))
            .collect();

        let mut seen = HashSet::new();
        let mut changes = ChangeSet::default();

        for entry in entries {
            let key = fold_case(&entry.name);
            if !seen.insert(key.clone()) {
                changes.collisions.push(entry);
                continue;
            }

            let existing = by_name.get(&key).copied();
            let kind = match existing {
                None => ChangeKind::New,
                Some(record) if has_changed(record, &entry) => ChangeKind::Changed,
                Some(_) => {
                    changes.unchanged.push(entry);
                    continue;
                }
            };

            match items.get(&key) {
                Some(item) => changes.work.push(WorkItem {
                    entry,
                    existing: existing.cloned(),
                    item: (*item).clone(),
                    kind,
                }),
                None => changes.uncorrelated.push(entry),
            }
        }

        changes
    }
}
