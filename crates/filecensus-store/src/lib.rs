//! SQLite persistence for the filecensus index.
//!
//! [`SqliteStore`] implements [`filecensus_core::IndexStore`] on a single
//! `rusqlite` connection in WAL mode. Each record write runs in its own
//! transaction, so an interrupted run leaves every completed record intact.

mod queries;
mod sqlite;

pub use queries::StoreSummary;
pub use sqlite::{SCHEMA_VERSION, SqliteStore};
