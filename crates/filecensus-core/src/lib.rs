//! Core records, configuration and store contract for filecensus.
//!
//! This crate provides the data model shared by every other crate in the
//! workspace: volume, directory, file and attribute records, the
//! [`IndexStore`] persistence contract, run configuration and error types.

mod config;
mod error;
mod hash;
mod record;
mod report;
mod store;
mod volume;

pub use config::{
    DEFAULT_EXCLUDED_DIRS, DirectoryFilter, IndexConfig, IndexConfigBuilder, default_database,
};
pub use error::{IndexError, ScanWarning, WarningKind};
pub use hash::{ContentHash, DEFAULT_HASH_SIZE_LIMIT, FileHash, TOO_LARGE_SENTINEL};
pub use record::{
    AttributeId, AttributeName, AttributeValue, Directory, DirectoryId, DirectoryPath, FileId,
    FileRecord, FileUpdate, NewDirectory, NewFile, Timestamps, fold_case,
};
pub use report::{WalkReport, WalkStats};
pub use store::IndexStore;
pub use volume::{Volume, VolumeFacts, VolumeId, volume_for_path};
