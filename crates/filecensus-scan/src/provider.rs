//! Attribute providers: sources of named, indexable file properties.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use humansize::{DECIMAL, format_size};

use filecensus_core::IndexError;

/// An entry of a directory listing, as the provider sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHandle {
    pub name: CompactString,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// A directory opened by an [`AttributeProvider`].
///
/// A listing belongs to the walking thread that opened it.
pub trait DirectoryListing {
    /// Items in the directory; folders only when `include_folders`.
    fn items(&self, include_folders: bool) -> Result<Vec<ItemHandle>, IndexError>;

    /// Value of the attribute at `index` (a position in
    /// [`AttributeProvider::attribute_names`]) for `item`.
    fn detail(&self, item: &ItemHandle, index: usize) -> Result<String, IndexError>;
}

/// Source of attribute names and per-directory listings.
pub trait AttributeProvider {
    type Listing: DirectoryListing;

    /// Attribute names, in column order.
    fn attribute_names(&self) -> Vec<String>;

    fn open_directory(&self, dir: &Path) -> Result<Self::Listing, IndexError>;
}

/// Attribute columns of [`MetadataProvider`].
pub const METADATA_ATTRIBUTES: &[&str] = &[
    "Name",
    "Size",
    "Item type",
    "Date modified",
    "Date created",
    "Date accessed",
    "Attributes",
    "Path",
    "Extension",
    "Link target",
];

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Provider built on filesystem metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataProvider;

impl MetadataProvider {
    pub fn new() -> Self {
        Self
    }
}

impl AttributeProvider for MetadataProvider {
    type Listing = MetadataListing;

    fn attribute_names(&self) -> Vec<String> {
        METADATA_ATTRIBUTES.iter().map(|s| s.to_string()).collect()
    }

    fn open_directory(&self, dir: &Path) -> Result<MetadataListing, IndexError> {
        let metadata = fs::metadata(dir).map_err(|e| IndexError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(IndexError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        Ok(MetadataListing {
            dir: dir.to_path_buf(),
        })
    }
}

/// Listing handed out by [`MetadataProvider`].
#[derive(Debug)]
pub struct MetadataListing {
    dir: PathBuf,
}

impl DirectoryListing for MetadataListing {
    fn items(&self, include_folders: bool) -> Result<Vec<ItemHandle>, IndexError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| IndexError::io(&self.dir, e))?;
        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| IndexError::io(&self.dir, e))?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let is_dir = file_type.is_dir();
            if is_dir && !include_folders {
                continue;
            }
            items.push(ItemHandle {
                name: CompactString::new(entry.file_name().to_string_lossy()),
                path: entry.path(),
                is_dir,
            });
        }
        Ok(items)
    }

    fn detail(&self, item: &ItemHandle, index: usize) -> Result<String, IndexError> {
        let metadata = fs::symlink_metadata(&item.path).map_err(|e| IndexError::Attribute {
            path: item.path.clone(),
            details: e.to_string(),
        })?;

        let value = match index {
            0 => item.name.to_string(),
            1 if metadata.is_dir() => String::new(),
            1 => format_size(metadata.len(), DECIMAL),
            2 => item_type(item, &metadata),
            3 => format_time(metadata.modified().ok()),
            4 => format_time(metadata.created().ok()),
            5 => format_time(metadata.accessed().ok()),
            6 => attribute_flags(item, &metadata),
            7 => item.path.display().to_string(),
            8 => extension(&item.path)
                .map(|ext| format!(".{ext}"))
                .unwrap_or_default(),
            9 if metadata.file_type().is_symlink() => fs::read_link(&item.path)
                .map(|target| target.display().to_string())
                .unwrap_or_default(),
            9 => String::new(),
            _ => {
                return Err(IndexError::Attribute {
                    path: item.path.clone(),
                    details: format!("no attribute at index {index}"),
                });
            }
        };
        Ok(value)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .filter(|ext| !ext.is_empty())
}

fn item_type(item: &ItemHandle, metadata: &Metadata) -> String {
    if metadata.is_dir() {
        return "File folder".to_string();
    }
    if metadata.file_type().is_symlink() {
        return "Shortcut".to_string();
    }
    match extension(&item.path) {
        Some(ext) => format!("{} File", ext.to_uppercase()),
        None => "File".to_string(),
    }
}

/// Explorer-style attribute letters.
fn attribute_flags(item: &ItemHandle, metadata: &Metadata) -> String {
    let mut flags = String::new();
    if metadata.permissions().readonly() {
        flags.push('R');
    }
    if item.name.starts_with('.') {
        flags.push('H');
    }
    if metadata.is_dir() {
        flags.push('D');
    }
    if metadata.file_type().is_symlink() {
        flags.push('L');
    }
    flags
}

fn format_time(time: Option<std::time::SystemTime>) -> String {
    time.map(|t| DateTime::<Utc>::from(t).format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn listing(temp: &TempDir) -> MetadataListing {
        MetadataProvider::new().open_directory(temp.path()).unwrap()
    }

    #[test]
    fn test_items_respect_include_folders() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), b"abc").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();

        let listing = listing(&temp);
        assert_eq!(listing.items(false).unwrap().len(), 1);
        assert_eq!(listing.items(true).unwrap().len(), 2);
    }

    #[test]
    fn test_details() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("song.mp3"), vec![0u8; 1500]).unwrap();
        let listing = listing(&temp);
        let item = listing.items(false).unwrap().remove(0);

        assert_eq!(listing.detail(&item, 0).unwrap(), "song.mp3");
        let size = listing.detail(&item, 1).unwrap();
        assert!(size.starts_with("1.5") && size.ends_with("kB"), "{size}");
        assert_eq!(listing.detail(&item, 2).unwrap(), "MP3 File");
        assert_eq!(listing.detail(&item, 3).unwrap().len(), 19);
        assert_eq!(listing.detail(&item, 8).unwrap(), ".mp3");
        assert_eq!(listing.detail(&item, 9).unwrap(), "");
        assert!(listing.detail(&item, METADATA_ATTRIBUTES.len()).is_err());
    }

    #[test]
    fn test_detail_of_vanished_item_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone.txt");
        fs::write(&path, b"x").unwrap();
        let listing = listing(&temp);
        let item = listing.items(false).unwrap().remove(0);
        fs::remove_file(&path).unwrap();

        assert!(matches!(
            listing.detail(&item, 0),
            Err(IndexError::Attribute { .. })
        ));
    }

    #[test]
    fn test_open_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert!(
            MetadataProvider::new()
                .open_directory(&temp.path().join("nope"))
                .is_err()
        );
    }
}
