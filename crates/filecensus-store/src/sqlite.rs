//! SQLite connection management: pragmas, schema versioning, error mapping.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::debug;

use filecensus_core::IndexError;

/// Current on-disk schema version (`PRAGMA user_version`).
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed index store.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| IndexError::StoreUnavailable {
            details: format!("{}: {e}", path.display()),
        })?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.configure_pragmas()?;
        store.migrate_schema()?;
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory().map_err(|e| IndexError::StoreUnavailable {
            details: e.to_string(),
        })?;
        let store = Self { conn, path: None };
        store.configure_pragmas()?;
        store.migrate_schema()?;
        Ok(store)
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn configure_pragmas(&self) -> Result<(), IndexError> {
        self.conn
            .execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA cache_size = -64000;
                 PRAGMA busy_timeout = 5000;",
            )
            .sql("pragmas")?;
        debug!("SQLite pragmas configured (WAL mode, 64MB cache)");
        Ok(())
    }

    /// Create the schema and stamp the version.
    pub(crate) fn migrate_schema(&self) -> Result<(), IndexError> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .sql("user_version")?;

        if version > SCHEMA_VERSION {
            return Err(IndexError::StoreUnavailable {
                details: format!(
                    "database schema version {version} is newer than supported {SCHEMA_VERSION}"
                ),
            });
        }

        self.conn
            .execute_batch(include_str!("schema.sql"))
            .sql("schema")?;
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
            .sql("user_version")?;
        debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        Ok(())
    }
}

/// Map `rusqlite` failures onto the index error taxonomy.
pub(crate) trait SqlResultExt<T> {
    fn sql(self, context: &'static str) -> Result<T, IndexError>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn sql(self, context: &'static str) -> Result<T, IndexError> {
        self.map_err(|err| classify(context, err))
    }
}

/// Lost-connection style failures are fatal; everything else is per record.
pub(crate) fn classify(context: &'static str, err: rusqlite::Error) -> IndexError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if matches!(
            failure.code,
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
        ) {
            return IndexError::StoreUnavailable {
                details: format!("{context}: {err}"),
            };
        }
    }
    IndexError::store(context, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_stamps_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        let version: i64 = store
            .connection()
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_migrate_is_repeatable() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.migrate_schema().unwrap();
        store.migrate_schema().unwrap();
    }

    #[test]
    fn test_rejects_newer_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("PRAGMA user_version = 99;")
            .unwrap();
        assert!(matches!(
            store.migrate_schema(),
            Err(IndexError::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn test_classify_constraint_is_not_fatal() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO attribute_name (name, name_key) VALUES ('Size', 'size')",
                [],
            )
            .unwrap();
        let err = store
            .connection()
            .execute(
                "INSERT INTO attribute_name (name, name_key) VALUES ('SIZE', 'size')",
                [],
            )
            .sql("attribute_name");
        let err = err.unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, IndexError::Store { .. }));
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("index.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_open_garbage_file_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("index.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();
        let err = SqliteStore::open(&path).err().unwrap();
        assert!(err.is_fatal());
    }
}
