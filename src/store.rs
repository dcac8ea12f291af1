//! SQLite-backed inventory and scan history storage.
//!
//! The store holds two tables:
//! - `applications`: id, name, version, install_path, install_date
//! - `scan_results`: id, scan_type, scan_timestamp, status, details
//!
//! A single connection is shared by every caller (API handlers, CLI,
//! background scans). Each operation takes the store lock for the whole
//! statement and its implicit commit, so statements never interleave and a
//! committed write is visible to the next lock holder. Separate calls are
//! not atomic with respect to each other; use [`InventoryStore::insert_applications`]
//! when a batch must land as a unit.
//!
//! # Example
//!
//! ```
//! use appcursor::{InventoryStore, InventoryItem};
//!
//! let store = InventoryStore::open_in_memory()?;
//! store.insert_application("Foo", "1.0", "/opt/foo", "2024-01-01")?;
//! store.insert_application("Bar", "2.0", "/opt/bar", "2024-01-02")?;
//!
//! let names: Vec<_> = store.fetch_applications()?.into_iter().map(|a| a.name).collect();
//! assert_eq!(names, ["Bar", "Foo"]);
//! # Ok::<(), appcursor::StoreError>(())
//! ```

use rusqlite::{params, params_from_iter, types::Value, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{
    Application, ApplicationField, InventoryItem, ScanRecord, ScanResultField, ScanStatus,
};

/// Path accepted by [`InventoryStore::open`] for a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value for {column}: {reason}")]
    InvalidValue {
        column: &'static str,
        reason: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

struct Inner {
    path: PathBuf,
    conn: Option<Connection>,
}

/// Thread-safe handle to the inventory database.
pub struct InventoryStore {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for InventoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("InventoryStore")
            .field("path", &inner.path)
            .field("open", &inner.conn.is_some())
            .finish()
    }
}

impl InventoryStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    ///
    /// Missing parent directories are created. Opening an existing
    /// database leaves its rows untouched.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = connect(&path)?;

        Ok(Self {
            inner: Mutex::new(Inner {
                path,
                conn: Some(conn),
            }),
        })
    }

    /// Opens a private in-memory database. Mostly useful in tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(MEMORY_PATH)
    }

    /// Returns the path the store is currently bound to.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    pub fn is_open(&self) -> bool {
        self.lock().conn.is_some()
    }

    /// Closes the current connection and binds the store to `path`.
    ///
    /// The old connection is released before the new one is opened. If the
    /// new path cannot be opened the store is left closed.
    pub fn reopen(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.lock();

        if let Some(conn) = inner.conn.take() {
            close_connection(conn)?;
        }

        inner.path = path.clone();
        inner.conn = Some(connect(&path)?);
        info!(path = %path.display(), "inventory store reopened");
        Ok(())
    }

    /// Releases the connection. Every later call fails with [`StoreError::Closed`].
    pub fn close(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        match inner.conn.take() {
            Some(conn) => {
                close_connection(conn)?;
                info!(path = %inner.path.display(), "inventory store closed");
                Ok(())
            }
            None => Err(StoreError::Closed),
        }
    }

    // --- Applications ---

    /// Appends one application row and returns its id.
    pub fn insert_application(
        &self,
        name: &str,
        version: &str,
        install_path: &str,
        install_date: &str,
    ) -> StoreResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO applications (name, version, install_path, install_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, version, install_path, install_date],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Appends every item inside one transaction.
    ///
    /// Either all rows are written or none are. Returns the new ids in
    /// input order.
    pub fn insert_applications(&self, items: &[InventoryItem]) -> StoreResult<Vec<i64>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(items.len());

            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO applications (name, version, install_path, install_date)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;

                for item in items {
                    stmt.execute(params![
                        item.name,
                        item.version,
                        item.install_path,
                        item.install_date
                    ])?;
                    ids.push(tx.last_insert_rowid());
                }
            }

            tx.commit()?;
            debug!(count = ids.len(), "inserted application batch");
            Ok(ids)
        })
    }

    /// Returns every application ordered by name (byte order), then id.
    pub fn fetch_applications(&self) -> StoreResult<Vec<Application>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, version, install_path, install_date
                 FROM applications
                 ORDER BY name ASC, id ASC",
            )?;

            let apps = stmt
                .query_map([], application_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(apps)
        })
    }

    /// Deletes an application by id. Returns the number of rows removed.
    pub fn delete_application(&self, id: i64) -> StoreResult<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM applications WHERE id = ?1", params![id])?)
        })
    }

    /// Updates the given columns of one application.
    ///
    /// Column names come from [`ApplicationField`], never from caller text.
    /// An empty field list is a no-op. Returns the number of rows changed.
    pub fn update_application(
        &self,
        id: i64,
        fields: &[(ApplicationField, String)],
    ) -> StoreResult<usize> {
        let columns: Vec<(&'static str, &str)> = fields
            .iter()
            .map(|(field, value)| (field.column(), value.as_str()))
            .collect();
        self.update_row("applications", id, &columns)
    }

    // --- Scan results ---

    /// Appends one scan-result row and returns its id.
    pub fn insert_scan_result(
        &self,
        scan_type: &str,
        scan_timestamp: &str,
        status: ScanStatus,
        details: &str,
    ) -> StoreResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scan_results (scan_type, scan_timestamp, status, details)
                 VALUES (?1, ?2, ?3, ?4)",
                params![scan_type, scan_timestamp, status.as_str(), details],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Returns every scan result, newest `scan_timestamp` first.
    pub fn fetch_scan_results(&self) -> StoreResult<Vec<ScanRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, scan_type, scan_timestamp, status, details
                 FROM scan_results
                 ORDER BY scan_timestamp DESC, id DESC",
            )?;

            let records = stmt
                .query_map([], scan_record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(records)
        })
    }

    /// Deletes a scan result by id. Returns the number of rows removed.
    pub fn delete_scan_result(&self, id: i64) -> StoreResult<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM scan_results WHERE id = ?1", params![id])?)
        })
    }

    /// Updates the given columns of one scan result. See [`update_application`](Self::update_application).
    ///
    /// Fails with [`StoreError::InvalidValue`] before touching the row if a
    /// `status` value is not a [`ScanStatus`].
    pub fn update_scan_result(
        &self,
        id: i64,
        fields: &[(ScanResultField, String)],
    ) -> StoreResult<usize> {
        for (field, value) in fields {
            field
                .validate(value)
                .map_err(|reason| StoreError::InvalidValue {
                    column: field.column(),
                    reason,
                })?;
        }

        let columns: Vec<(&'static str, &str)> = fields
            .iter()
            .map(|(field, value)| (field.column(), value.as_str()))
            .collect();
        self.update_row("scan_results", id, &columns)
    }

    fn update_row(
        &self,
        table: &'static str,
        id: i64,
        columns: &[(&'static str, &str)],
    ) -> StoreResult<usize> {
        // Last value wins when a column is named twice.
        let mut assignments: Vec<(&'static str, &str)> = Vec::new();
        for &(column, value) in columns {
            match assignments.iter_mut().find(|(c, _)| *c == column) {
                Some(existing) => existing.1 = value,
                None => assignments.push((column, value)),
            }
        }

        if assignments.is_empty() {
            return Ok(0);
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            set_clause,
            assignments.len() + 1
        );

        let mut values: Vec<Value> = assignments
            .iter()
            .map(|(_, value)| Value::Text(value.to_string()))
            .collect();
        values.push(Value::Integer(id));

        self.with_conn(|conn| Ok(conn.execute(&sql, params_from_iter(values))?))
    }

    /// Runs `f` against the open connection while holding the store lock.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut inner = self.lock();
        let conn = inner.conn.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn connect(path: &Path) -> StoreResult<Connection> {
    let conn = if path.as_os_str() == MEMORY_PATH {
        Connection::open_in_memory()?
    } else {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Connection::open(path)?
    };

    init_schema(&conn)?;
    debug!(path = %path.display(), "inventory store opened");
    Ok(conn)
}

fn close_connection(conn: Connection) -> StoreResult<()> {
    conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scan_results (
            id INTEGER PRIMARY KEY,
            scan_type TEXT,
            scan_timestamp TEXT,
            status TEXT,
            details TEXT
        );
        CREATE TABLE IF NOT EXISTS applications (
            id INTEGER PRIMARY KEY,
            name TEXT,
            version TEXT,
            install_path TEXT,
            install_date TEXT
        );",
    )
}

fn application_from_row(row: &rusqlite::Row) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        version: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        install_path: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        install_date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

fn scan_record_from_row(row: &rusqlite::Row) -> rusqlite::Result<ScanRecord> {
    Ok(ScanRecord {
        id: row.get(0)?,
        scan_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        scan_timestamp: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        status: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        details: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}
