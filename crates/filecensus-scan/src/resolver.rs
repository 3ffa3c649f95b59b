//! Directory identity resolution.

use std::path::Path;

use tracing::debug;

use filecensus_core::{
    DirectoryId, DirectoryPath, IndexError, IndexStore, NewDirectory, Volume, VolumeId,
};

use crate::context::ScanContext;

/// Maps directory paths to stored ids, creating missing ancestors first.
pub struct DirectoryResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: IndexStore + ?Sized> DirectoryResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Id of the directory at `absolute` on `volume`.
    pub fn resolve(
        &self,
        ctx: &mut ScanContext,
        volume: &Volume,
        absolute: &Path,
    ) -> Result<DirectoryId, IndexError> {
        let path = DirectoryPath::relative_to(&volume.root_path(), absolute)?;
        ctx.retain_ancestors(volume.id, &path);
        self.resolve_path(ctx, volume.id, &path)
    }

    /// Id of `path` on `volume`. Recursion depth equals the path depth.
    pub fn resolve_path(
        &self,
        ctx: &mut ScanContext,
        volume: VolumeId,
        path: &DirectoryPath,
    ) -> Result<DirectoryId, IndexError> {
        if let Some(id) = ctx.cached_directory(volume, path) {
            return Ok(id);
        }
        if let Some(existing) = self.store.find_directory(volume, path)? {
            ctx.cache_directory(volume, path, existing.id);
            return Ok(existing.id);
        }

        let parent_id = match path.parent() {
            Some(parent) => Some(self.resolve_path(ctx, volume, &parent)?),
            None => None,
        };
        let id = self.store.insert_directory(&NewDirectory {
            volume_id: volume,
            parent_id,
            name: path.leaf().to_string(),
            path: path.clone(),
        })?;
        debug!(volume = volume.0, path = %path, id = id.0, "Created directory");
        ctx.cache_directory(volume, path, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecensus_core::VolumeFacts;
    use filecensus_store::SqliteStore;

    fn setup() -> (SqliteStore, Volume) {
        let store = SqliteStore::open_in_memory().unwrap();
        let facts = VolumeFacts::new("/mnt/data");
        let id = store.upsert_volume(None, &facts).unwrap();
        (store, Volume::new(id, facts))
    }

    #[test]
    fn test_resolve_creates_ancestors() {
        let (store, volume) = setup();
        let mut ctx = ScanContext::default();
        let resolver = DirectoryResolver::new(&store);

        let c = resolver
            .resolve(&mut ctx, &volume, Path::new("/mnt/data/A/B/C"))
            .unwrap();

        let chain = store.directory_chain(c).unwrap();
        let names: Vec<_> = chain.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A", ""]);
        assert_eq!(chain[1].path.as_str(), "A/B");
        assert!(chain[3].is_root());
        assert_eq!(store.count_summary().unwrap().directories, 4);
    }

    #[test]
    fn test_resolve_is_idempotent_over_case_and_whitespace() {
        let (store, volume) = setup();
        let resolver = DirectoryResolver::new(&store);

        let mut ctx = ScanContext::default();
        let first = resolver
            .resolve(&mut ctx, &volume, Path::new("/mnt/data/A/B/C"))
            .unwrap();

        let mut fresh = ScanContext::default();
        let again = resolver
            .resolve_path(&mut fresh, volume.id, &DirectoryPath::new(" a\\b\\c "))
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(store.count_summary().unwrap().directories, 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_backslash_names_are_not_split() {
        let (store, volume) = setup();
        let resolver = DirectoryResolver::new(&store);
        let mut ctx = ScanContext::default();

        let literal = resolver
            .resolve(&mut ctx, &volume, Path::new("/mnt/data/x\\y"))
            .unwrap();
        let nested = resolver
            .resolve(&mut ctx, &volume, Path::new("/mnt/data/x/y"))
            .unwrap();
        assert_ne!(literal, nested);

        let chain = store.directory_chain(literal).unwrap();
        let names: Vec<_> = chain.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["x\\y", ""]);

        let mut fresh = ScanContext::default();
        let again = resolver
            .resolve(&mut fresh, &volume, Path::new("/mnt/data/x\\y"))
            .unwrap();
        assert_eq!(again, literal);
    }

    #[test]
    fn test_cache_holds_only_the_current_chain() {
        let (store, volume) = setup();
        let resolver = DirectoryResolver::new(&store);
        let mut ctx = ScanContext::default();

        for leaf in ["a/one", "a/two", "b/three", "b/three/four"] {
            resolver
                .resolve(&mut ctx, &volume, &Path::new("/mnt/data").join(leaf))
                .unwrap();
        }
        // root, b, b/three, b/three/four
        assert_eq!(ctx.resolved_directories(), 4);
        assert_eq!(store.count_summary().unwrap().directories, 7);

        let again = resolver
            .resolve(&mut ctx, &volume, Path::new("/mnt/data/a/one"))
            .unwrap();
        let stored = store
            .find_directory(volume.id, &DirectoryPath::new("a/one"))
            .unwrap()
            .unwrap();
        assert_eq!(again, stored.id);
        // root and a/one; a was found in the store without walking up
        assert_eq!(ctx.resolved_directories(), 2);
    }

    #[test]
    fn test_resolve_root() {
        let (store, volume) = setup();
        let mut ctx = ScanContext::default();
        let root = DirectoryResolver::new(&store)
            .resolve(&mut ctx, &volume, Path::new("/mnt/data"))
            .unwrap();
        let dir = store.find_directory_by_id(root).unwrap().unwrap();
        assert!(dir.is_root());
        assert_eq!(dir.name, "");
    }

    #[test]
    fn test_path_outside_volume() {
        let (store, volume) = setup();
        let mut ctx = ScanContext::default();
        let err = DirectoryResolver::new(&store)
            .resolve(&mut ctx, &volume, Path::new("/srv/other"))
            .unwrap_err();
        assert!(matches!(err, IndexError::PathOutsideVolume { .. }));
    }
}
