//! SQLite database handle shared by the local stores

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{backup::Progress, Connection, DatabaseName};
use tracing::{info, warn};

use super::StoreError;

/// Path value selecting a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ITEMS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 0,
        price REAL NOT NULL DEFAULT 0,
        category TEXT NOT NULL DEFAULT '',
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )";

const USERS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        age INTEGER NOT NULL,
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        gender TEXT NOT NULL,
        education TEXT NOT NULL,
        created_at TEXT NOT NULL
    )";

/// Columns added to `items` after its first release
const ITEMS_LATE_COLUMNS: &[&str] = &["notes", "created_at", "updated_at"];

/// One SQLite connection behind a mutex; clones share it
///
/// Every store operation takes the lock for its whole duration, so calls are
/// serviced one at a time in the order they acquire it.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY {
            return Self::open_in_memory();
        }

        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        };
        db.init()?;
        info!(path = %path.display(), "Opened database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        db.init()?;
        Ok(db)
    }

    /// File backing this database, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` with exclusive access to the connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    /// Copy the whole database into `dest`
    pub fn backup_to(&self, dest: impl AsRef<Path>) -> Result<(), StoreError> {
        let dest = dest.as_ref();
        self.with_conn(|conn| {
            conn.backup(DatabaseName::Main, dest, None)?;
            Ok(())
        })?;
        info!(dest = %dest.display(), "Database backup written");
        Ok(())
    }

    /// Replace the database contents with those of a backup file
    pub fn restore_from(&self, src: impl AsRef<Path>) -> Result<(), StoreError> {
        let src = src.as_ref();
        if !src.exists() {
            warn!(src = %src.display(), "Backup file missing");
            return Err(StoreError::StorageUnavailable(format!(
                "Backup file {} not found",
                src.display()
            )));
        }

        self.with_conn(|conn| {
            conn.restore(DatabaseName::Main, src, None::<fn(Progress)>)?;
            Ok(())
        })?;
        // The backup may predate the current schema
        self.init()?;
        info!(src = %src.display(), "Database restored from backup");
        Ok(())
    }

    fn init(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch(ITEMS_TABLE)?;
            conn.execute_batch(USERS_TABLE)?;
            migrate_items(conn)
        })
    }
}

/// Add columns missing from an `items` table created by an older release
fn migrate_items(conn: &mut Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("PRAGMA table_info(items)")?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let now = Utc::now();
    for column in ITEMS_LATE_COLUMNS {
        if existing.iter().any(|c| c == column) {
            continue;
        }
        warn!(column, "Adding missing items column");
        conn.execute_batch(&format!("ALTER TABLE items ADD COLUMN {column} TEXT"))?;
        if *column != "notes" {
            conn.execute(&format!("UPDATE items SET {column} = ?1"), [now])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_columns(db: &Database, table: &str) -> Vec<String> {
        db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
            let columns = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(columns)
        })
        .unwrap()
    }

    #[test]
    fn creates_both_tables() {
        let db = Database::open_in_memory().unwrap();
        let items = table_columns(&db, "items");
        assert!(items.contains(&"code".to_string()));
        assert!(items.contains(&"updated_at".to_string()));
        let users = table_columns(&db, "users");
        assert!(users.contains(&"email".to_string()));
        assert!(db.path().is_none());
    }

    #[test]
    fn memory_path_opens_in_memory() {
        let db = Database::open(IN_MEMORY).unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn upgrades_legacy_items_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    code TEXT UNIQUE,
                    name TEXT NOT NULL,
                    quantity INTEGER DEFAULT 0,
                    price REAL DEFAULT 0,
                    category TEXT
                );
                INSERT INTO items (code, name, quantity, price, category)
                VALUES ('A-1', 'Kabel', 3, 1500, 'Bahan');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let columns = table_columns(&db, "items");
        for column in ITEMS_LATE_COLUMNS {
            assert!(columns.contains(&column.to_string()), "missing {column}");
        }
        let stamped: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM items WHERE created_at IS NOT NULL",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(stamped, 1);
    }

    #[test]
    fn restore_rejects_missing_file() {
        let db = Database::open_in_memory().unwrap();
        let err = db.restore_from("/definitely/not/here.db").unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
    }
}
