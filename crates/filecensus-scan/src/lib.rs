//! Incremental tree walker for the filecensus index.
//!
//! # Overview
//!
//! `filecensus-scan` keeps an [`IndexStore`](filecensus_core::IndexStore) in
//! step with a directory tree. Per directory it:
//!
//! - **resolves** the directory identity, creating missing ancestors
//! - **detects** which files are new or changed since the last run
//! - **captures** attribute values from an [`AttributeProvider`]
//! - **hashes** the files that need it in parallel via rayon
//! - **persists** each file with its attribute set atomically
//!
//! A failure listing a directory skips that subtree; a failure on one file
//! skips that file. Only a lost store aborts the run.
//!
//! # Example
//!
//! ```rust,no_run
//! use filecensus_core::IndexConfig;
//! use filecensus_scan::{Indexer, MetadataProvider};
//! use filecensus_store::SqliteStore;
//! use filecensus_volume::SysfsEnumerator;
//!
//! let config = IndexConfig::new("/mnt/data", "/var/lib/filecensus/index.db");
//! let store = SqliteStore::open(&config.database).unwrap();
//! let enumerator = SysfsEnumerator::new();
//! let provider = MetadataProvider::new();
//!
//! let indexer = Indexer::new(&store, &enumerator, &provider, &config).unwrap();
//! let summary = indexer.run().unwrap();
//! println!("Inserted {} files", summary.totals().files_inserted);
//! ```

mod catalog;
mod context;
mod detect;
mod hasher;
mod indexer;
mod progress;
mod provider;
mod resolver;
mod walker;

pub use catalog::{AttributeCatalog, AttributeHeader};
pub use context::ScanContext;
pub use detect::{ChangeDetector, ChangeKind, ChangeSet, DiskEntry, WorkItem, has_changed};
pub use hasher::{hash_file, hash_reader, hash_with_limit};
pub use indexer::{IndexSummary, Indexer};
pub use progress::ScanProgress;
pub use provider::{
    AttributeProvider, DirectoryListing, ItemHandle, METADATA_ATTRIBUTES, MetadataListing,
    MetadataProvider,
};
pub use resolver::DirectoryResolver;
pub use walker::{DirectoryOutcome, FileOutcome, IndexWalker};
