//! Linux volume enumeration from `/proc`, `/sys/block` and `/dev/disk`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use filecensus_core::{IndexError, VolumeFacts};

use crate::enumerator::{PhysicalDisk, VolumeEnumerator};

/// Filesystem types that never back an indexable volume.
const VIRTUAL_FS: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "overlay",
    "proc",
    "pstore",
    "ramfs",
    "securityfs",
    "squashfs",
    "sysfs",
    "tmpfs",
    "tracefs",
];

const NETWORK_FS: &[&str] = &["nfs", "nfs4", "cifs", "smb3", "smbfs", "fuse.sshfs", "9p"];

/// Block devices that are not physical media.
const VIRTUAL_DISK_PREFIXES: &[&str] = &["loop", "ram", "zram"];

/// One parsed line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub path: PathBuf,
    pub fs_type: String,
}

impl MountEntry {
    /// Whether this mount is backed by a block device or network share.
    /// The root mount always counts.
    pub fn is_volume(&self) -> bool {
        if self.path == Path::new("/") {
            return true;
        }
        let fs_type = self.fs_type.to_ascii_lowercase();
        if VIRTUAL_FS.contains(&fs_type.as_str()) {
            return false;
        }
        self.device.starts_with('/') || self.is_network()
    }

    pub fn is_network(&self) -> bool {
        NETWORK_FS.contains(&self.fs_type.to_ascii_lowercase().as_str())
    }

    /// Kernel name of the backing device (`sda1`).
    fn device_name(&self) -> String {
        device_name(&self.device)
    }
}

/// Enumerator backed by the Linux pseudo-filesystems.
///
/// Every root is configurable so the enumerator can run against a fixture
/// tree.
#[derive(Debug, Clone)]
pub struct SysfsEnumerator {
    mounts: PathBuf,
    sys_block: PathBuf,
    dev_disk: PathBuf,
}

impl Default for SysfsEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsEnumerator {
    pub fn new() -> Self {
        Self::with_roots("/proc/self/mounts", "/sys/block", "/dev/disk")
    }

    /// Use alternative locations for the mount table, `/sys/block` and
    /// `/dev/disk`.
    pub fn with_roots(
        mounts: impl Into<PathBuf>,
        sys_block: impl Into<PathBuf>,
        dev_disk: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mounts: mounts.into(),
            sys_block: sys_block.into(),
            dev_disk: dev_disk.into(),
        }
    }

    /// Volume mounts, first mount per device only.
    pub fn mounts(&self) -> Result<Vec<MountEntry>, IndexError> {
        let raw = fs::read_to_string(&self.mounts).map_err(|e| IndexError::Enumeration {
            context: "mounts",
            details: format!("{}: {e}", self.mounts.display()),
        })?;
        let mut seen = HashSet::new();
        Ok(parse_mounts(&raw)
            .into_iter()
            .filter(MountEntry::is_volume)
            .filter(|entry| seen.insert(entry.device.clone()))
            .collect())
    }

    /// Map of device name to link name for one `/dev/disk/by-*` directory.
    fn links(&self, kind: &str) -> HashMap<String, String> {
        let dir = self.dev_disk.join(kind);
        let mut links = HashMap::new();
        let Ok(entries) = fs::read_dir(&dir) else {
            debug!(dir = %dir.display(), "No device links");
            return links;
        };
        for entry in entries.flatten() {
            let Ok(target) = fs::read_link(entry.path()) else {
                continue;
            };
            let Some(device) = target.file_name() else {
                continue;
            };
            let name = unescape_udev(&entry.file_name().to_string_lossy());
            links.insert(device.to_string_lossy().into_owned(), name);
        }
        links
    }

    fn read_attr(&self, disk: &str, attr: &str) -> Option<String> {
        fs::read_to_string(self.sys_block.join(disk).join(attr))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn interface(&self, disk: &str) -> String {
        if let Some(transport) = self.read_attr(disk, "device/transport") {
            return transport.to_ascii_uppercase();
        }
        if disk.starts_with("nvme") {
            return "NVMe".to_string();
        }
        if disk.starts_with("mmcblk") {
            return "MMC".to_string();
        }
        if self.read_attr(disk, "removable").as_deref() == Some("1") {
            return "USB".to_string();
        }
        "SCSI".to_string()
    }
}

impl VolumeEnumerator for SysfsEnumerator {
    fn list_volumes(&self) -> Result<Vec<VolumeFacts>, IndexError> {
        let uuids = self.links("by-uuid");
        let labels = self.links("by-label");

        let volumes = self
            .mounts()?
            .into_iter()
            .map(|mount| {
                let name = mount.device_name();
                let drive_type = if mount.is_network() { "Network" } else { "Fixed" };
                VolumeFacts::new(mount.path.to_string_lossy())
                    .with_serial(uuids.get(&name).cloned().unwrap_or_default())
                    .with_label(labels.get(&name).cloned().unwrap_or_default())
                    .with_type(drive_type)
                    .with_size(volume_size(&mount.path))
            })
            .collect();
        Ok(volumes)
    }

    fn physical_disks(&self) -> Result<Vec<PhysicalDisk>, IndexError> {
        let entries = fs::read_dir(&self.sys_block).map_err(|e| IndexError::Enumeration {
            context: "physical_disks",
            details: format!("{}: {e}", self.sys_block.display()),
        })?;

        let mut disks: Vec<PhysicalDisk> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| {
                !VIRTUAL_DISK_PREFIXES
                    .iter()
                    .any(|prefix| name.starts_with(prefix))
            })
            .map(|name| {
                let model = self.read_attr(&name, "device/model").unwrap_or_default();
                let interface = self.interface(&name);
                PhysicalDisk::new(name, model, interface)
            })
            .collect();
        disks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(disks)
    }

    fn letters_for_disk(&self, disk: &PhysicalDisk) -> Result<Vec<String>, IndexError> {
        let disk_dir = self.sys_block.join(&disk.name);
        let entries = fs::read_dir(&disk_dir).map_err(|e| IndexError::Enumeration {
            context: "letters_for_disk",
            details: format!("{}: {e}", disk_dir.display()),
        })?;

        let mut devices: HashSet<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(&disk.name))
            .collect();
        devices.insert(disk.name.clone());

        Ok(self
            .mounts()?
            .into_iter()
            .filter(|mount| devices.contains(&mount.device_name()))
            .map(|mount| mount.path.to_string_lossy().into_owned())
            .collect())
    }
}

/// Parse `/proc/self/mounts` content. Malformed lines are skipped.
pub fn parse_mounts(raw: &str) -> Vec<MountEntry> {
    raw.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                debug!(line, "Skipping malformed mount line");
                return None;
            }
            Some(MountEntry {
                device: unescape_mount_field(fields[0]),
                path: PathBuf::from(unescape_mount_field(fields[1])),
                fs_type: fields[2].to_string(),
            })
        })
        .collect()
}

/// Kernel device name, following `/dev/mapper` style symlinks when they
/// resolve on this host.
fn device_name(device: &str) -> String {
    let path = Path::new(device);
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| device.to_string())
}

/// Decode the kernel's `\NNN` octal escapes.
fn unescape_mount_field(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                out.push((digits[0] - b'0') * 64 + (digits[1] - b'0') * 8 + (digits[2] - b'0'));
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Decode udev's `\xHH` escapes in `/dev/disk/by-label` names.
fn unescape_udev(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') && i + 3 < bytes.len() {
            let high = (bytes[i + 2] as char).to_digit(16);
            let low = (bytes[i + 3] as char).to_digit(16);
            if let (Some(high), Some(low)) = (high, low) {
                out.push((high * 16 + low) as u8);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(unix)]
fn volume_size(path: &Path) -> u64 {
    match nix::sys::statvfs::statvfs(path) {
        Ok(stat) => stat.blocks().saturating_mul(stat.fragment_size()),
        Err(error) => {
            debug!(path = %path.display(), %error, "statvfs failed");
            0
        }
    }
}

#[cfg(not(unix))]
fn volume_size(_path: &Path) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mounts_skips_malformed() {
        let mounts = parse_mounts(
            "/dev/sda1 / ext4 rw,relatime 0 0\nbroken\ntmpfs /tmp tmpfs rw 0 0\n",
        );
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].device, "/dev/sda1");
        assert!(mounts[0].is_volume());
        assert!(!mounts[1].is_volume());
    }

    #[test]
    fn test_unescape_mount_field() {
        assert_eq!(unescape_mount_field("/mnt/My\\040Disk"), "/mnt/My Disk");
        assert_eq!(unescape_mount_field("/mnt/tab\\011x"), "/mnt/tab\tx");
        assert_eq!(unescape_mount_field("/mnt/plain\\"), "/mnt/plain\\");
        assert_eq!(unescape_mount_field("/mnt/x\\9"), "/mnt/x\\9");
    }

    #[test]
    fn test_unescape_udev() {
        assert_eq!(unescape_udev("My\\x20Disk"), "My Disk");
        assert_eq!(unescape_udev("DATA"), "DATA");
        assert_eq!(unescape_udev("bad\\xZZ"), "bad\\xZZ");
    }

    #[test]
    fn test_network_mounts_are_volumes() {
        let entry = MountEntry {
            device: "server:/export".to_string(),
            path: PathBuf::from("/mnt/nas"),
            fs_type: "nfs4".to_string(),
        };
        assert!(entry.is_volume());
        assert!(entry.is_network());
    }

    #[test]
    fn test_virtual_filesystems_are_skipped() {
        for fs_type in ["proc", "sysfs", "cgroup2", "overlay", "squashfs"] {
            let entry = MountEntry {
                device: "/dev/loop0".to_string(),
                path: PathBuf::from("/snap/x"),
                fs_type: fs_type.to_string(),
            };
            assert!(!entry.is_volume(), "{fs_type}");
        }
    }

    #[test]
    fn test_root_mount_is_always_a_volume() {
        let entry = MountEntry {
            device: "overlay".to_string(),
            path: PathBuf::from("/"),
            fs_type: "overlay".to_string(),
        };
        assert!(entry.is_volume());
    }
}
