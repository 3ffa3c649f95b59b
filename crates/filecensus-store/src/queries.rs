//! `IndexStore` implementation and read-side queries.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use filecensus_core::{
    AttributeId, AttributeName, AttributeValue, Directory, DirectoryId, DirectoryPath, FileHash,
    FileId, FileRecord, FileUpdate, IndexError, IndexStore, NewDirectory, NewFile, Timestamps,
    Volume, VolumeFacts, VolumeId, fold_case,
};

use crate::sqlite::{SqlResultExt, SqliteStore};

/// Row counts across the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub volumes: u64,
    pub directories: u64,
    pub files: u64,
    pub attribute_names: u64,
    pub attribute_values: u64,
}

const VOLUME_COLUMNS: &str = "id, letter, drive_type, model, serial, label, total_size";
const DIRECTORY_COLUMNS: &str = "id, volume_id, parent_id, name, path";
const FILE_COLUMNS: &str =
    "id, volume_id, directory_id, name, created_at, modified_at, length, hash";

impl SqliteStore {
    /// Count rows in every table.
    pub fn count_summary(&self) -> Result<StoreSummary, IndexError> {
        let count = |table: &str| -> Result<u64, IndexError> {
            let n: i64 = self
                .connection()
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .sql("count_summary")?;
            Ok(n.max(0) as u64)
        };
        Ok(StoreSummary {
            volumes: count("volume")?,
            directories: count("directory")?,
            files: count("file_record")?,
            attribute_names: count("attribute_name")?,
            attribute_values: count("attribute_value")?,
        })
    }

    /// The directory `id` followed by each ancestor up to its volume root.
    pub fn directory_chain(&self, id: DirectoryId) -> Result<Vec<Directory>, IndexError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);

        while let Some(current) = next {
            if !seen.insert(current) {
                return Err(IndexError::store(
                    "directory_chain",
                    format!("cycle at directory {}", current.0),
                ));
            }
            let directory = self.find_directory_by_id(current)?.ok_or_else(|| {
                IndexError::store("directory_chain", format!("missing directory {}", current.0))
            })?;
            next = directory.parent_id;
            chain.push(directory);
        }

        Ok(chain)
    }

    /// Look a file up by directory and case-insensitive name.
    pub fn find_file(
        &self,
        directory: DirectoryId,
        name: &str,
    ) -> Result<Option<FileRecord>, IndexError> {
        self.connection()
            .prepare_cached(&format!(
                "SELECT {FILE_COLUMNS} FROM file_record WHERE directory_id = ?1 AND name_key = ?2"
            ))
            .sql("find_file")?
            .query_row(params![directory.0, fold_case(name)], file_from_row)
            .optional()
            .sql("find_file")?
            .map(decode_file)
            .transpose()
    }
}

impl IndexStore for SqliteStore {
    fn create_schema(&self) -> Result<(), IndexError> {
        self.migrate_schema()
    }

    fn list_volumes(&self) -> Result<Vec<Volume>, IndexError> {
        let mut stmt = self
            .connection()
            .prepare_cached(&format!("SELECT {VOLUME_COLUMNS} FROM volume ORDER BY id"))
            .sql("list_volumes")?;
        let rows = stmt
            .query_map([], volume_from_row)
            .sql("list_volumes")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql("list_volumes")?;
        Ok(rows)
    }

    fn find_volume(&self, id: VolumeId) -> Result<Option<Volume>, IndexError> {
        self.connection()
            .prepare_cached(&format!("SELECT {VOLUME_COLUMNS} FROM volume WHERE id = ?1"))
            .sql("find_volume")?
            .query_row(params![id.0], volume_from_row)
            .optional()
            .sql("find_volume")
    }

    fn upsert_volume(
        &self,
        id: Option<VolumeId>,
        facts: &VolumeFacts,
    ) -> Result<VolumeId, IndexError> {
        let size = to_sql_len(facts.total_size, "upsert_volume")?;
        if let Some(id) = id {
            let changed = self
                .connection()
                .prepare_cached(
                    "UPDATE volume SET letter = ?2, drive_type = ?3, model = ?4, serial = ?5, \
                     label = ?6, total_size = ?7 WHERE id = ?1",
                )
                .sql("upsert_volume")?
                .execute(params![
                    id.0,
                    facts.letter,
                    facts.drive_type,
                    facts.model,
                    facts.serial,
                    facts.label,
                    size
                ])
                .sql("upsert_volume")?;
            if changed > 0 {
                return Ok(id);
            }
        }

        self.connection()
            .prepare_cached(
                "INSERT INTO volume (id, letter, drive_type, model, serial, label, total_size) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .sql("upsert_volume")?
            .execute(params![
                id.map(|id| id.0),
                facts.letter,
                facts.drive_type,
                facts.model,
                facts.serial,
                facts.label,
                size
            ])
            .sql("upsert_volume")?;
        let id = VolumeId(self.connection().last_insert_rowid());
        debug!(volume = id.0, letter = %facts.letter, "Inserted volume");
        Ok(id)
    }

    fn find_directory(
        &self,
        volume: VolumeId,
        path: &DirectoryPath,
    ) -> Result<Option<Directory>, IndexError> {
        self.connection()
            .prepare_cached(&format!(
                "SELECT {DIRECTORY_COLUMNS} FROM directory WHERE volume_id = ?1 AND path_key = ?2"
            ))
            .sql("find_directory")?
            .query_row(params![volume.0, path.key()], directory_from_row)
            .optional()
            .sql("find_directory")
    }

    fn find_directory_by_id(&self, id: DirectoryId) -> Result<Option<Directory>, IndexError> {
        self.connection()
            .prepare_cached(&format!(
                "SELECT {DIRECTORY_COLUMNS} FROM directory WHERE id = ?1"
            ))
            .sql("find_directory_by_id")?
            .query_row(params![id.0], directory_from_row)
            .optional()
            .sql("find_directory_by_id")
    }

    fn insert_directory(&self, directory: &NewDirectory) -> Result<DirectoryId, IndexError> {
        self.connection()
            .prepare_cached(
                "INSERT INTO directory (volume_id, parent_id, name, path, path_key) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .sql("insert_directory")?
            .execute(params![
                directory.volume_id.0,
                directory.parent_id.map(|p| p.0),
                directory.name,
                directory.path.as_str(),
                directory.path.key()
            ])
            .sql("insert_directory")?;
        Ok(DirectoryId(self.connection().last_insert_rowid()))
    }

    fn list_files(
        &self,
        volume: VolumeId,
        directory: DirectoryId,
    ) -> Result<Vec<FileRecord>, IndexError> {
        let mut stmt = self
            .connection()
            .prepare_cached(&format!(
                "SELECT {FILE_COLUMNS} FROM file_record \
                 WHERE directory_id = ?1 AND volume_id = ?2 ORDER BY id"
            ))
            .sql("list_files")?;
        let rows = stmt
            .query_map(params![directory.0, volume.0], file_from_row)
            .sql("list_files")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql("list_files")?;
        Ok(rows.into_iter().map(decode_or_flag_damaged).collect())
    }

    fn insert_file(
        &self,
        file: &NewFile,
        attributes: &[AttributeValue],
    ) -> Result<FileId, IndexError> {
        let timestamps = file.timestamps.truncated();
        let tx = self.connection().unchecked_transaction().sql("insert_file")?;
        tx.prepare_cached(
            "INSERT INTO file_record \
             (volume_id, directory_id, name, name_key, created_at, modified_at, length, hash) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .sql("insert_file")?
        .execute(params![
            file.volume_id.0,
            file.directory_id.0,
            file.name.as_str(),
            fold_case(&file.name),
            timestamps.created.map(|t| t.timestamp()),
            timestamps.modified.timestamp(),
            to_sql_len(file.length, "insert_file")?,
            file.hash.to_stored()
        ])
        .sql("insert_file")?;
        let id = FileId(tx.last_insert_rowid());
        write_attributes(&tx, id, attributes)?;
        tx.commit().sql("insert_file")?;
        Ok(id)
    }

    fn update_file(
        &self,
        id: FileId,
        update: &FileUpdate,
        attributes: &[AttributeValue],
    ) -> Result<(), IndexError> {
        let timestamps = update.timestamps.truncated();
        let tx = self.connection().unchecked_transaction().sql("update_file")?;
        let changed = tx
            .prepare_cached(
                "UPDATE file_record SET created_at = ?2, modified_at = ?3, length = ?4, hash = ?5 \
                 WHERE id = ?1",
            )
            .sql("update_file")?
            .execute(params![
                id.0,
                timestamps.created.map(|t| t.timestamp()),
                timestamps.modified.timestamp(),
                to_sql_len(update.length, "update_file")?,
                update.hash.to_stored()
            ])
            .sql("update_file")?;
        if changed == 0 {
            return Err(IndexError::store(
                "update_file",
                format!("file {} does not exist", id.0),
            ));
        }
        tx.execute("DELETE FROM attribute_value WHERE file_id = ?1", params![id.0])
            .sql("update_file")?;
        write_attributes(&tx, id, attributes)?;
        tx.commit().sql("update_file")
    }

    fn replace_attribute_values(
        &self,
        file: FileId,
        values: &[AttributeValue],
    ) -> Result<(), IndexError> {
        let tx = self
            .connection()
            .unchecked_transaction()
            .sql("replace_attribute_values")?;
        tx.execute(
            "DELETE FROM attribute_value WHERE file_id = ?1",
            params![file.0],
        )
        .sql("replace_attribute_values")?;
        write_attributes(&tx, file, values)?;
        tx.commit().sql("replace_attribute_values")
    }

    fn attribute_values(&self, file: FileId) -> Result<Vec<AttributeValue>, IndexError> {
        let mut stmt = self
            .connection()
            .prepare_cached(
                "SELECT attribute_id, value FROM attribute_value \
                 WHERE file_id = ?1 ORDER BY attribute_id",
            )
            .sql("attribute_values")?;
        let rows = stmt
            .query_map(params![file.0], |row| {
                Ok(AttributeValue::new(AttributeId(row.get(0)?), row.get::<_, String>(1)?))
            })
            .sql("attribute_values")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql("attribute_values")?;
        Ok(rows)
    }

    fn get_or_create_attribute_id(&self, name: &str) -> Result<AttributeId, IndexError> {
        let key = fold_case(name);
        let existing: Option<i64> = self
            .connection()
            .prepare_cached("SELECT id FROM attribute_name WHERE name_key = ?1")
            .sql("get_or_create_attribute_id")?
            .query_row(params![key], |row| row.get(0))
            .optional()
            .sql("get_or_create_attribute_id")?;
        if let Some(id) = existing {
            return Ok(AttributeId(id));
        }

        self.connection()
            .prepare_cached("INSERT INTO attribute_name (name, name_key) VALUES (?1, ?2)")
            .sql("get_or_create_attribute_id")?
            .execute(params![name, key])
            .sql("get_or_create_attribute_id")?;
        Ok(AttributeId(self.connection().last_insert_rowid()))
    }

    fn list_attribute_names(&self) -> Result<Vec<AttributeName>, IndexError> {
        let mut stmt = self
            .connection()
            .prepare_cached("SELECT id, name FROM attribute_name ORDER BY id")
            .sql("list_attribute_names")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AttributeName {
                    id: AttributeId(row.get(0)?),
                    name: row.get(1)?,
                })
            })
            .sql("list_attribute_names")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql("list_attribute_names")?;
        Ok(rows)
    }
}

fn write_attributes(
    conn: &rusqlite::Connection,
    file: FileId,
    attributes: &[AttributeValue],
) -> Result<(), IndexError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO attribute_value (file_id, attribute_id, value) \
             VALUES (?1, ?2, ?3)",
        )
        .sql("write_attributes")?;
    for attribute in attributes {
        stmt.execute(params![file.0, attribute.attribute_id.0, attribute.value])
            .sql("write_attributes")?;
    }
    Ok(())
}

fn to_sql_len(value: u64, context: &'static str) -> Result<i64, IndexError> {
    i64::try_from(value).map_err(|_| IndexError::store(context, format!("{value} overflows i64")))
}

fn volume_from_row(row: &Row<'_>) -> rusqlite::Result<Volume> {
    let size: i64 = row.get(6)?;
    Ok(Volume::new(
        VolumeId(row.get(0)?),
        VolumeFacts {
            letter: row.get(1)?,
            drive_type: row.get(2)?,
            model: row.get(3)?,
            serial: row.get(4)?,
            label: row.get(5)?,
            total_size: size.max(0) as u64,
        },
    ))
}

fn directory_from_row(row: &Row<'_>) -> rusqlite::Result<Directory> {
    let path: String = row.get(4)?;
    Ok(Directory {
        id: DirectoryId(row.get(0)?),
        volume_id: VolumeId(row.get(1)?),
        parent_id: row.get::<_, Option<i64>>(2)?.map(DirectoryId),
        name: row.get(3)?,
        path: DirectoryPath::from_normalized(path),
    })
}

/// Raw file columns before timestamp and hash decoding.
struct FileRow {
    id: i64,
    volume_id: i64,
    directory_id: i64,
    name: String,
    created_at: Option<i64>,
    modified_at: i64,
    length: i64,
    hash: String,
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        volume_id: row.get(1)?,
        directory_id: row.get(2)?,
        name: row.get(3)?,
        created_at: row.get(4)?,
        modified_at: row.get(5)?,
        length: row.get(6)?,
        hash: row.get(7)?,
    })
}

fn decode_file(row: FileRow) -> Result<FileRecord, IndexError> {
    let modified = seconds_to_time(row.modified_at)?;
    let created = row.created_at.map(seconds_to_time).transpose()?;
    Ok(FileRecord {
        id: FileId(row.id),
        volume_id: VolumeId(row.volume_id),
        directory_id: DirectoryId(row.directory_id),
        name: CompactString::from(row.name),
        timestamps: Timestamps::new(modified, created),
        length: row.length.max(0) as u64,
        hash: FileHash::from_stored(&row.hash)?,
    })
}

/// Decode a listed row. A row whose hash or timestamps cannot be decoded
/// comes back with an unreachable length and epoch timestamps, so the walk
/// sees it as changed and rewrites it in place.
fn decode_or_flag_damaged(row: FileRow) -> FileRecord {
    let (id, volume_id, directory_id) = (row.id, row.volume_id, row.directory_id);
    let name = CompactString::from(row.name.as_str());
    match decode_file(row) {
        Ok(record) => record,
        Err(error) => {
            warn!(file = id, %name, %error, "Damaged file row, will be rewritten");
            FileRecord {
                id: FileId(id),
                volume_id: VolumeId(volume_id),
                directory_id: DirectoryId(directory_id),
                name,
                timestamps: Timestamps::new(DateTime::UNIX_EPOCH, None),
                length: u64::MAX,
                hash: FileHash::TooLarge,
            }
        }
    }
}

fn seconds_to_time(seconds: i64) -> Result<DateTime<Utc>, IndexError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| IndexError::store("timestamp", format!("{seconds} is out of range")))
}
