//! Directory, file and attribute records.

use std::fmt;
use std::path::{Component, Path};
use std::time::SystemTime;

use chrono::{DateTime, Timelike, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::hash::FileHash;
use crate::volume::VolumeId;

/// Unique identifier of a stored directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectoryId(pub i64);

/// Unique identifier of a stored file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

/// Unique identifier of a stored attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub i64);

/// Case-folded form used for every case-insensitive comparison.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// File timestamps as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Creation time (if the filesystem reports one).
    pub created: Option<DateTime<Utc>>,
    /// Last write time.
    pub modified: DateTime<Utc>,
}

impl Timestamps {
    /// Create timestamps from chrono values.
    pub fn new(modified: DateTime<Utc>, created: Option<DateTime<Utc>>) -> Self {
        Self { created, modified }
    }

    /// Create timestamps from filesystem metadata times.
    pub fn from_system(modified: SystemTime, created: Option<SystemTime>) -> Self {
        Self {
            created: created.map(DateTime::<Utc>::from),
            modified: DateTime::<Utc>::from(modified),
        }
    }

    /// Drop sub-second precision.
    pub fn truncated(self) -> Self {
        Self {
            created: self.created.map(whole_seconds),
            modified: whole_seconds(self.modified),
        }
    }

    /// Equality at whole-second resolution.
    pub fn same_second(&self, other: &Self) -> bool {
        self.truncated() == other.truncated()
    }
}

fn whole_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(0).unwrap_or(time)
}

/// Normalized directory path relative to its volume root.
///
/// Segments are joined with `/`. Paths taken from the filesystem keep their
/// components verbatim; raw strings given to [`new`](Self::new) are split on
/// either separator, lose a leading drive prefix (`D:`) and are trimmed. Two
/// paths are the same directory when their [`key`](Self::key)s are equal.
/// The volume root is the empty path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryPath {
    display: String,
    key: String,
}

impl DirectoryPath {
    /// Normalize a raw relative path.
    pub fn new(raw: &str) -> Self {
        let trimmed = strip_drive_prefix(raw.trim());
        let display = trimmed
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/");
        let key = fold_case(&display);
        Self { display, key }
    }

    /// Wrap a path that is already normalized, such as one read back from
    /// the store. Nothing is split or stripped.
    pub fn from_normalized(display: impl Into<String>) -> Self {
        let display = display.into();
        let key = fold_case(&display);
        Self { display, key }
    }

    /// The volume root.
    pub fn root() -> Self {
        Self {
            display: String::new(),
            key: String::new(),
        }
    }

    /// Path of `absolute` relative to the volume mounted at `volume_root`.
    pub fn relative_to(volume_root: &Path, absolute: &Path) -> Result<Self, IndexError> {
        let relative =
            absolute
                .strip_prefix(volume_root)
                .map_err(|_| IndexError::PathOutsideVolume {
                    path: absolute.to_path_buf(),
                    volume: volume_root.display().to_string(),
                })?;
        let segments: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Ok(Self::from_normalized(segments.join("/")))
    }

    /// Display form.
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Case-folded lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this is the volume root.
    pub fn is_root(&self) -> bool {
        self.display.is_empty()
    }

    /// Last segment; empty for the root.
    pub fn leaf(&self) -> &str {
        self.display.rsplit('/').next().unwrap_or_default()
    }

    /// Parent path; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.display.rsplit_once('/') {
            Some((parent, _)) => Some(Self::from_normalized(parent)),
            None => Some(Self::root()),
        }
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.display.split('/').count()
        }
    }
}

impl fmt::Display for DirectoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.display)
    }
}

fn strip_drive_prefix(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &path[2..]
    } else {
        path
    }
}

/// A stored directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub id: DirectoryId,
    pub volume_id: VolumeId,
    /// `None` only for a volume root.
    pub parent_id: Option<DirectoryId>,
    pub name: String,
    pub path: DirectoryPath,
}

impl Directory {
    /// Whether this is a volume root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A directory row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDirectory {
    pub volume_id: VolumeId,
    pub parent_id: Option<DirectoryId>,
    pub name: String,
    pub path: DirectoryPath,
}

/// A stored file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub volume_id: VolumeId,
    pub directory_id: DirectoryId,
    pub name: CompactString,
    pub timestamps: Timestamps,
    pub length: u64,
    pub hash: FileHash,
}

/// A file row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub volume_id: VolumeId,
    pub directory_id: DirectoryId,
    pub name: CompactString,
    pub timestamps: Timestamps,
    pub length: u64,
    pub hash: FileHash,
}

/// The fields rewritten on a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub timestamps: Timestamps,
    pub length: u64,
    pub hash: FileHash,
}

/// A named attribute in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeName {
    pub id: AttributeId,
    pub name: String,
}

/// One attribute value captured for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub attribute_id: AttributeId,
    pub value: String,
}

impl AttributeValue {
    /// Create a new attribute value.
    pub fn new(attribute_id: AttributeId, value: impl Into<String>) -> Self {
        Self {
            attribute_id,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_directory_path_normalization() {
        let path = DirectoryPath::new("  D:\\Music\\Albums\\ ");
        assert_eq!(path.as_str(), "Music/Albums");
        assert_eq!(path.key(), "music/albums");
        assert_eq!(path.leaf(), "Albums");
        assert_eq!(path.depth(), 2);
        assert_eq!(path, DirectoryPath::new("Music//Albums/"));
    }

    #[test]
    fn test_directory_path_parent_chain() {
        let path = DirectoryPath::new("a/b/c");
        let parent = path.parent().unwrap();
        assert_eq!(parent.as_str(), "a/b");
        let grandparent = parent.parent().unwrap();
        assert_eq!(grandparent.as_str(), "a");
        let root = grandparent.parent().unwrap();
        assert!(root.is_root());
        assert_eq!(root.leaf(), "");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_relative_to_volume_root() {
        let path =
            DirectoryPath::relative_to(Path::new("/mnt/data"), Path::new("/mnt/data/x/y")).unwrap();
        assert_eq!(path.as_str(), "x/y");

        let root = DirectoryPath::relative_to(Path::new("/mnt/data"), Path::new("/mnt/data")).unwrap();
        assert!(root.is_root());

        let err = DirectoryPath::relative_to(Path::new("/mnt/data"), Path::new("/srv/x"));
        assert!(matches!(err, Err(IndexError::PathOutsideVolume { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_to_keeps_literal_segments() {
        let root = Path::new("/mnt/data");
        let odd = DirectoryPath::relative_to(root, Path::new("/mnt/data/x\\y")).unwrap();
        assert_eq!(odd.as_str(), "x\\y");
        assert_eq!(odd.depth(), 1);
        assert_eq!(odd.leaf(), "x\\y");
        assert!(odd.parent().unwrap().is_root());

        let nested = DirectoryPath::relative_to(root, Path::new("/mnt/data/x/y")).unwrap();
        assert_ne!(odd.key(), nested.key());

        let drive_like = DirectoryPath::relative_to(root, Path::new("/mnt/data/C:notes/a")).unwrap();
        assert_eq!(drive_like.as_str(), "C:notes/a");
        assert_eq!(drive_like.parent().unwrap().as_str(), "C:notes");
    }

    #[test]
    fn test_timestamps_truncation() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let with_millis = base + chrono::Duration::milliseconds(750);
        let a = Timestamps::new(with_millis, Some(with_millis));
        let b = Timestamps::new(base, Some(base));
        assert_ne!(a, b);
        assert!(a.same_second(&b));

        let later = Timestamps::new(base + chrono::Duration::seconds(1), Some(base));
        assert!(!later.same_second(&b));
    }

    #[test]
    fn test_missing_creation_time_differs() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let a = Timestamps::new(base, None);
        let b = Timestamps::new(base, Some(base));
        assert!(!a.same_second(&b));
    }
}
