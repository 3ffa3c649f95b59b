//! Persistence contract consumed by the indexing engine.

use crate::error::IndexError;
use crate::record::{
    AttributeId, AttributeName, AttributeValue, Directory, DirectoryId, DirectoryPath, FileId,
    FileRecord, FileUpdate, NewDirectory, NewFile,
};
use crate::volume::{Volume, VolumeFacts, VolumeId};

/// Durable storage for volumes, directories, files and attributes.
///
/// Every write is atomic per record: a directory, a file together with its
/// attribute set, or a volume is either fully written or not at all.
/// Implementations report a lost backing store as
/// [`IndexError::StoreUnavailable`] and per-record failures as
/// [`IndexError::Store`].
pub trait IndexStore {
    /// Create tables and indexes if they do not exist.
    fn create_schema(&self) -> Result<(), IndexError>;

    /// All stored volumes, ordered by id.
    fn list_volumes(&self) -> Result<Vec<Volume>, IndexError>;

    fn find_volume(&self, id: VolumeId) -> Result<Option<Volume>, IndexError>;

    /// Overwrite the volume `id` with `facts`, or insert a new one when `id`
    /// is `None`.
    fn upsert_volume(&self, id: Option<VolumeId>, facts: &VolumeFacts)
    -> Result<VolumeId, IndexError>;

    /// Look a directory up by its case-insensitive path key.
    fn find_directory(
        &self,
        volume: VolumeId,
        path: &DirectoryPath,
    ) -> Result<Option<Directory>, IndexError>;

    fn find_directory_by_id(&self, id: DirectoryId) -> Result<Option<Directory>, IndexError>;

    fn insert_directory(&self, directory: &NewDirectory) -> Result<DirectoryId, IndexError>;

    /// Every file record stored for a directory.
    fn list_files(
        &self,
        volume: VolumeId,
        directory: DirectoryId,
    ) -> Result<Vec<FileRecord>, IndexError>;

    /// Insert a file record and its attribute set in one transaction.
    fn insert_file(
        &self,
        file: &NewFile,
        attributes: &[AttributeValue],
    ) -> Result<FileId, IndexError>;

    /// Rewrite a file record and replace its attribute set in one transaction.
    fn update_file(
        &self,
        id: FileId,
        update: &FileUpdate,
        attributes: &[AttributeValue],
    ) -> Result<(), IndexError>;

    /// Replace the whole attribute set of a file.
    fn replace_attribute_values(
        &self,
        file: FileId,
        values: &[AttributeValue],
    ) -> Result<(), IndexError>;

    fn attribute_values(&self, file: FileId) -> Result<Vec<AttributeValue>, IndexError>;

    /// Id for `name`, created on first use. Names compare case-insensitively.
    fn get_or_create_attribute_id(&self, name: &str) -> Result<AttributeId, IndexError>;

    fn list_attribute_names(&self) -> Result<Vec<AttributeName>, IndexError>;
}
