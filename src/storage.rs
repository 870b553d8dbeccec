//! Local persistence for the moderation queue.
//!
//! Everything lives in one `SQLite` file:
//!
//! ```text
//! moderation       # Pending entries, one row per queued edit
//! moderation_log   # Audit log of moderator decisions
//! change_tag       # Tags attached to host revisions
//! session          # Per-session key/value data (anonymous markers)
//! ```
//!
//! Writes are reached through consequences only; reads are open to anyone.

mod cache;
mod log;
mod moderation;
mod session;
mod tags;

use std::{
    cell::Cell,
    fs, io,
    path::{Path, PathBuf},
};

use rusqlite::Connection;

pub use log::LogEntry;
pub use moderation::{UpsertBranch, UpsertOutcome, UpsertStrategy};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StorageError>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS moderation (
        mod_id INTEGER PRIMARY KEY AUTOINCREMENT,
        mod_timestamp TEXT NOT NULL,
        mod_user_text TEXT NOT NULL,
        mod_anonymous INTEGER NOT NULL DEFAULT 0,
        mod_namespace INTEGER NOT NULL,
        mod_title TEXT NOT NULL,
        mod_comment TEXT NOT NULL DEFAULT '',
        mod_minor INTEGER NOT NULL DEFAULT 0,
        mod_bot INTEGER NOT NULL DEFAULT 0,
        mod_text TEXT NOT NULL,
        mod_section TEXT NOT NULL DEFAULT '',
        mod_preload_id TEXT NOT NULL,
        mod_preloadable INTEGER NOT NULL DEFAULT 0,
        mod_status TEXT NOT NULL DEFAULT 'pending',
        mod_merged_revid INTEGER,
        mod_rejected_by TEXT,
        mod_type TEXT NOT NULL DEFAULT 'edit'
    );
    CREATE TABLE IF NOT EXISTS moderation_log (
        log_id INTEGER PRIMARY KEY AUTOINCREMENT,
        log_action TEXT NOT NULL,
        log_actor TEXT NOT NULL,
        log_namespace INTEGER NOT NULL,
        log_title TEXT NOT NULL,
        log_params TEXT NOT NULL,
        log_timestamp TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS change_tag (
        ct_rev_id INTEGER NOT NULL,
        ct_tag TEXT NOT NULL,
        PRIMARY KEY (ct_rev_id, ct_tag)
    );
    CREATE TABLE IF NOT EXISTS session (
        session_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (session_id, key)
    );
";

/// `SQLite`-backed storage for pending entries and their side tables.
pub struct Storage {
    conn: Connection,
    upsert: UpsertStrategy,
    typed_entries: bool,

    /// Oldest pending timestamp; outer `None` means not computed yet.
    pending_time: Cell<Option<Option<jiff::Timestamp>>>,
}

impl Storage {
    /// Opens (or creates) the database file at `path`.
    ///
    /// The parent directory is created if it doesn't exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Wraps an already open connection, creating any missing tables.
    ///
    /// An existing `moderation` table is left as it is, so a database from
    /// before typed entries keeps working without `mod_type`.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let typed_entries = has_column(&conn, "moderation", "mod_type")?;
        let storage = Self {
            conn,
            upsert: UpsertStrategy::default(),
            typed_entries,
            pending_time: Cell::new(None),
        };
        storage.create_unique_index()?;
        Ok(storage)
    }

    /// Selects how the moderation table upsert is performed.
    #[must_use]
    pub fn with_upsert_strategy(mut self, strategy: UpsertStrategy) -> Self {
        self.upsert = strategy;
        self
    }

    /// Returns the default database path: `~/.modqueue/modqueue.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".modqueue").join("modqueue.sqlite"))
    }

    /// Whether the moderation table has the `mod_type` column.
    ///
    /// Checked against the live table when the storage is opened.
    pub fn supports_typed_entries(&self) -> bool {
        self.typed_entries
    }

    /// The uniqueness key of the moderation table.
    fn unique_columns(&self) -> &'static [&'static str] {
        if self.supports_typed_entries() {
            &[
                "mod_preloadable",
                "mod_namespace",
                "mod_title",
                "mod_preload_id",
                "mod_type",
            ]
        } else {
            &[
                "mod_preloadable",
                "mod_namespace",
                "mod_title",
                "mod_preload_id",
            ]
        }
    }

    fn create_unique_index(&self) -> Result<()> {
        let columns = self.unique_columns().join(", ");
        self.conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS moderation_load ON moderation ({columns})"
        ))?;
        Ok(())
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Parses a stored RFC 3339 timestamp.
fn parse_timestamp(raw: &str, column: &str) -> Result<jiff::Timestamp> {
    raw.parse::<jiff::Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use tempfile::TempDir;

    pub(crate) fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("db").join("modqueue.sqlite")).unwrap();
        (dir, storage)
    }

    /// A moderation table as it looked before typed entries.
    pub(crate) fn legacy_storage() -> Storage {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE moderation (
                mod_id INTEGER PRIMARY KEY AUTOINCREMENT,
                mod_timestamp TEXT NOT NULL,
                mod_user_text TEXT NOT NULL,
                mod_anonymous INTEGER NOT NULL DEFAULT 0,
                mod_namespace INTEGER NOT NULL,
                mod_title TEXT NOT NULL,
                mod_comment TEXT NOT NULL DEFAULT '',
                mod_minor INTEGER NOT NULL DEFAULT 0,
                mod_bot INTEGER NOT NULL DEFAULT 0,
                mod_text TEXT NOT NULL,
                mod_section TEXT NOT NULL DEFAULT '',
                mod_preload_id TEXT NOT NULL,
                mod_preloadable INTEGER NOT NULL DEFAULT 0,
                mod_status TEXT NOT NULL DEFAULT 'pending',
                mod_merged_revid INTEGER,
                mod_rejected_by TEXT
            );",
        )
        .unwrap();
        Storage::from_connection(conn).unwrap()
    }

    #[test]
    fn new_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("modqueue.sqlite");

        Storage::new(&path).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn fresh_schema_supports_typed_entries() {
        let (_dir, storage) = test_storage();
        assert!(storage.supports_typed_entries());
    }

    #[test]
    fn legacy_schema_lacks_typed_entries() {
        let storage = legacy_storage();
        assert!(!storage.supports_typed_entries());
    }

    #[test]
    fn unreadable_database_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modqueue.sqlite");
        fs::write(&path, "not a database\n".repeat(300)).unwrap();

        let result = Storage::new(&path);

        assert!(matches!(result, Err(StorageError::Sqlite(_))));
    }

    #[test]
    fn reopening_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modqueue.sqlite");

        let storage = Storage::new(&path).unwrap();
        storage
            .tag_revision(7, "moderation-merged")
            .unwrap();
        drop(storage);

        let storage = Storage::new(&path).unwrap();
        assert_eq!(storage.revision_tags(7).unwrap(), vec!["moderation-merged"]);
    }
}
