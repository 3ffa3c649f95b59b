//! State shared by every directory of one indexing run.

use std::collections::HashMap;
use std::path::Path;

use filecensus_core::{DirectoryId, DirectoryPath, Volume, VolumeId, volume_for_path};

use crate::catalog::AttributeCatalog;

/// Per-run context: the active volumes, the attribute catalog and the ids of
/// the directories on the current walk path.
#[derive(Debug, Default)]
pub struct ScanContext {
    volumes: Vec<Volume>,
    catalog: AttributeCatalog,
    directories: HashMap<(VolumeId, String), DirectoryId>,
}

impl ScanContext {
    pub fn new(volumes: Vec<Volume>, catalog: AttributeCatalog) -> Self {
        Self {
            volumes,
            catalog,
            directories: HashMap::new(),
        }
    }

    /// Active volumes for this run.
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// The active volume whose root is the longest prefix of `path`.
    pub fn volume_for(&self, path: &Path) -> Option<&Volume> {
        volume_for_path(&self.volumes, path)
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    /// Number of directory ids currently cached.
    pub fn resolved_directories(&self) -> usize {
        self.directories.len()
    }

    /// Forget every cached directory that is not `path` or one of its
    /// ancestors. The walk is depth-first, so only that chain is reused.
    pub(crate) fn retain_ancestors(&mut self, volume: VolumeId, path: &DirectoryPath) {
        let target = path.key();
        self.directories.retain(|(cached_volume, key), _| {
            *cached_volume == volume && is_ancestor_key(key, target)
        });
    }

    pub(crate) fn cached_directory(
        &self,
        volume: VolumeId,
        path: &DirectoryPath,
    ) -> Option<DirectoryId> {
        self.directories
            .get(&(volume, path.key().to_string()))
            .copied()
    }

    pub(crate) fn cache_directory(&mut self, volume: VolumeId, path: &DirectoryPath, id: DirectoryId) {
        self.directories.insert((volume, path.key().to_string()), id);
    }
}

fn is_ancestor_key(ancestor: &str, path: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || (path.starts_with(ancestor) && path[ancestor.len()..].starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_keeps_only_the_ancestor_chain() {
        let mut ctx = ScanContext::default();
        let volume = VolumeId(1);
        for (i, raw) in ["", "a", "a/b", "a/bc", "a/b/c", "d"].iter().enumerate() {
            ctx.cache_directory(volume, &DirectoryPath::new(raw), DirectoryId(i as i64));
        }
        ctx.cache_directory(VolumeId(2), &DirectoryPath::root(), DirectoryId(9));

        ctx.retain_ancestors(volume, &DirectoryPath::new("a/b/x"));

        assert_eq!(ctx.resolved_directories(), 3);
        assert!(ctx.cached_directory(volume, &DirectoryPath::new("a/b")).is_some());
        assert!(ctx.cached_directory(volume, &DirectoryPath::new("a/bc")).is_none());
        assert!(ctx.cached_directory(volume, &DirectoryPath::new("d")).is_none());
        assert!(ctx.cached_directory(VolumeId(2), &DirectoryPath::root()).is_none());
    }
}
