//! Volume identity records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Unique identifier of a stored volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub i64);

/// Facts about a volume as reported by the enumerator.
///
/// Every field except `letter` may be blank. `letter` is a drive letter
/// (`"D"`) on hosts that have them and the mount point (`"/mnt/data"`)
/// everywhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFacts {
    pub letter: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub drive_type: String,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub model: String,
}

impl VolumeFacts {
    /// Create facts for a letter with everything else blank.
    pub fn new(letter: impl Into<String>) -> Self {
        Self {
            letter: letter.into(),
            ..Self::default()
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_size(mut self, total_size: u64) -> Self {
        self.total_size = total_size;
        self
    }

    pub fn with_type(mut self, drive_type: impl Into<String>) -> Self {
        self.drive_type = drive_type.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Trim every string field.
    pub fn trimmed(mut self) -> Self {
        for field in [
            &mut self.letter,
            &mut self.label,
            &mut self.serial,
            &mut self.drive_type,
            &mut self.model,
        ] {
            *field = field.trim().to_string();
        }
        self
    }

    /// Whether both letters name the same mount.
    pub fn same_letter(&self, other: &str) -> bool {
        self.letter.eq_ignore_ascii_case(other)
    }

    /// Filesystem path of the volume root.
    pub fn root_path(&self) -> PathBuf {
        let bytes = self.letter.as_bytes();
        if bytes.len() == 1 && bytes[0].is_ascii_alphabetic() {
            PathBuf::from(format!("{}:\\", self.letter))
        } else {
            PathBuf::from(&self.letter)
        }
    }
}

/// A stored volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    #[serde(flatten)]
    pub facts: VolumeFacts,
}

impl Volume {
    /// Create a volume record.
    pub fn new(id: VolumeId, facts: VolumeFacts) -> Self {
        Self { id, facts }
    }

    /// Filesystem path of the volume root.
    pub fn root_path(&self) -> PathBuf {
        self.facts.root_path()
    }

    /// Whether `path` lives on this volume.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(self.root_path())
    }
}

/// Pick the volume whose root is the longest prefix of `path`.
pub fn volume_for_path<'a>(volumes: &'a [Volume], path: &Path) -> Option<&'a Volume> {
    volumes
        .iter()
        .filter(|volume| volume.contains(path))
        .max_by_key(|volume| volume.root_path().as_os_str().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_for_letters_and_mounts() {
        assert_eq!(VolumeFacts::new("D").root_path(), PathBuf::from("D:\\"));
        assert_eq!(
            VolumeFacts::new("/mnt/data").root_path(),
            PathBuf::from("/mnt/data")
        );
    }

    #[test]
    fn test_trimmed() {
        let facts = VolumeFacts::new(" E ").with_label(" DATA ").with_serial("  ");
        let facts = facts.trimmed();
        assert_eq!(facts.letter, "E");
        assert_eq!(facts.label, "DATA");
        assert!(facts.serial.is_empty());
    }

    #[test]
    fn test_volume_for_path_prefers_longest_mount() {
        let volumes = vec![
            Volume::new(VolumeId(1), VolumeFacts::new("/")),
            Volume::new(VolumeId(2), VolumeFacts::new("/mnt/data")),
        ];
        let found = volume_for_path(&volumes, Path::new("/mnt/data/photos")).unwrap();
        assert_eq!(found.id, VolumeId(2));
        let found = volume_for_path(&volumes, Path::new("/home/user")).unwrap();
        assert_eq!(found.id, VolumeId(1));
    }
}
