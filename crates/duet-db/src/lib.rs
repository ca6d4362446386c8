pub mod migrations;
pub mod models;
pub mod queries;
mod store;

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use duet_core::DmError;
use rusqlite::{Connection, OpenFlags};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Read-only connections in the pool. At least one is always opened.
    pub readers: usize,
    /// How long a statement waits on a locked database before giving up.
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            readers: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite engine: one serialized writer plus a round-robin pool of readers.
///
/// WAL mode lets readers proceed while the writer commits. The writer mutex
/// only serializes writes from this process; other processes sharing the file
/// are kept honest by `BEGIN IMMEDIATE` and the unique indexes.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &DbConfig::default())
    }

    pub fn open_with(path: &Path, config: &DbConfig) -> Result<Self> {
        let writer = Connection::open(path)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        writer.busy_timeout(config.busy_timeout)?;

        migrations::run(&writer)?;

        let pool_size = config.readers.max(1);
        let mut readers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(config.busy_timeout)?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            pool_size
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Run `f` on a read-only connection.
    pub fn with_conn<F, T>(&self, f: F) -> duet_core::Result<T>
    where
        F: FnOnce(&Connection) -> duet_core::Result<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx].lock().map_err(|e| {
            error!("Reader lock poisoned: {}", e);
            DmError::storage("reader lock poisoned")
        })?;
        f(&conn)
    }

    /// Run `f` on the writer connection.
    pub fn with_conn_mut<F, T>(&self, f: F) -> duet_core::Result<T>
    where
        F: FnOnce(&Connection) -> duet_core::Result<T>,
    {
        let conn = self.writer.lock().map_err(|e| {
            error!("Writer lock poisoned: {}", e);
            DmError::storage("writer lock poisoned")
        })?;
        f(&conn)
    }
}

/// Maps rusqlite failures into the retryable storage error.
pub(crate) trait StorageExt<T> {
    fn storage(self) -> duet_core::Result<T>;
}

impl<T> StorageExt<T> for std::result::Result<T, rusqlite::Error> {
    fn storage(self) -> duet_core::Result<T> {
        self.map_err(|e| {
            error!("SQLite error: {}", e);
            DmError::storage(e)
        })
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> duet_core::Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> duet_core::Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => {
                error!("SQLite error: {}", e);
                Err(DmError::storage(e))
            }
        }
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation
                && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
