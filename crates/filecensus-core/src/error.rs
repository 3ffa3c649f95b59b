//! Error types for indexing operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while indexing.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The volume enumerator could not answer a query.
    #[error("Volume enumeration failed ({context}): {details}")]
    Enumeration {
        context: &'static str,
        details: String,
    },

    /// The attribute provider failed for an item.
    #[error("Attribute provider failed for {path}: {details}")]
    Attribute { path: PathBuf, details: String },

    /// A path does not live under the volume it was resolved against.
    #[error("{path} is outside volume {volume}")]
    PathOutsideVolume { path: PathBuf, volume: String },

    /// No active volume contains the path.
    #[error("No volume found for {path}")]
    VolumeNotFound { path: PathBuf },

    /// A stored hash could not be decoded.
    #[error("Invalid stored hash: {value:?}")]
    InvalidHash { value: String },

    /// A store operation failed for one record.
    #[error("Store failure in {context}: {details}")]
    Store {
        context: &'static str,
        details: String,
    },

    /// The store itself is gone (cannot open, corrupt, disk I/O).
    #[error("Store unavailable: {details}")]
    StoreUnavailable { details: String },
}

impl IndexError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a store error for one record operation.
    pub fn store(context: &'static str, details: impl ToString) -> Self {
        Self::Store {
            context,
            details: details.to_string(),
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Only a lost store is fatal; everything else is isolated to the
    /// directory or file that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// One file could not be processed.
    ItemFailed,
    /// An on-disk file has no matching attribute-provider item.
    Uncorrelated,
    /// Two on-disk names fold to the same case-insensitive name.
    NameCollision,
    /// A volume enumeration or association query failed.
    Enumeration,
}

/// Non-fatal warning encountered during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from an error, picking the kind from the variant.
    pub fn from_error(path: impl Into<PathBuf>, error: &IndexError) -> Self {
        let kind = match error {
            IndexError::PermissionDenied { .. } => WarningKind::PermissionDenied,
            IndexError::NotFound { .. } | IndexError::Io { .. } => WarningKind::ReadError,
            IndexError::Enumeration { .. } => WarningKind::Enumeration,
            _ => WarningKind::ItemFailed,
        };
        Self {
            path: path.into(),
            message: error.to_string(),
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create an uncorrelated-item warning.
    pub fn uncorrelated(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("No attribute item for {}", path.display()),
            path,
            kind: WarningKind::Uncorrelated,
        }
    }
}
