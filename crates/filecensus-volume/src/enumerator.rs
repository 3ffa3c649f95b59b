//! Volume enumeration contract and a fixed in-memory implementation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use filecensus_core::{IndexError, VolumeFacts};

/// A physical disk that carries one or more volumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalDisk {
    /// Kernel device name (`sda`, `nvme0n1`).
    pub name: String,
    /// Hardware model string, possibly blank.
    pub model: String,
    /// Bus or interface type (`USB`, `NVMe`, `SCSI`), possibly blank.
    pub interface: String,
}

impl PhysicalDisk {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            interface: interface.into(),
        }
    }
}

/// Source of currently mounted volumes and their physical disks.
pub trait VolumeEnumerator {
    /// Volumes visible right now. Serial and label may be blank.
    fn list_volumes(&self) -> Result<Vec<VolumeFacts>, IndexError>;

    /// Physical disks, for the enrichment pass.
    fn physical_disks(&self) -> Result<Vec<PhysicalDisk>, IndexError>;

    /// Letters (mount points) of the volumes that live on `disk`.
    fn letters_for_disk(&self, disk: &PhysicalDisk) -> Result<Vec<String>, IndexError>;
}

/// Enumerator that answers from fixed data.
#[derive(Debug, Clone, Default)]
pub struct StaticEnumerator {
    volumes: Vec<VolumeFacts>,
    disks: Vec<PhysicalDisk>,
    letters: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
}

impl StaticEnumerator {
    pub fn new(volumes: Vec<VolumeFacts>) -> Self {
        Self {
            volumes,
            ..Self::default()
        }
    }

    /// Add a disk carrying `letters`.
    pub fn with_disk<I, S>(mut self, disk: PhysicalDisk, letters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.letters.insert(
            disk.name.clone(),
            letters.into_iter().map(Into::into).collect(),
        );
        self.disks.push(disk);
        self
    }

    /// Add a disk whose association query fails.
    pub fn with_failing_disk(mut self, disk: PhysicalDisk) -> Self {
        self.failing.insert(disk.name.clone());
        self.disks.push(disk);
        self
    }
}

impl VolumeEnumerator for StaticEnumerator {
    fn list_volumes(&self) -> Result<Vec<VolumeFacts>, IndexError> {
        Ok(self.volumes.clone())
    }

    fn physical_disks(&self) -> Result<Vec<PhysicalDisk>, IndexError> {
        Ok(self.disks.clone())
    }

    fn letters_for_disk(&self, disk: &PhysicalDisk) -> Result<Vec<String>, IndexError> {
        if self.failing.contains(&disk.name) {
            return Err(IndexError::Enumeration {
                context: "letters_for_disk",
                details: format!("association query failed for {}", disk.name),
            });
        }
        Ok(self.letters.get(&disk.name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_enumerator_answers() {
        let enumerator = StaticEnumerator::new(vec![VolumeFacts::new("D")])
            .with_disk(PhysicalDisk::new("sda", "WDC WD10", "SCSI"), ["D"])
            .with_failing_disk(PhysicalDisk::new("sdb", "", ""));

        assert_eq!(enumerator.list_volumes().unwrap().len(), 1);
        let disks = enumerator.physical_disks().unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(enumerator.letters_for_disk(&disks[0]).unwrap(), vec!["D"]);
        assert!(enumerator.letters_for_disk(&disks[1]).is_err());
    }
}
