//! The transaction serializer around the single SQLite connection.
//!
//! One accessor owns one connection. Every operation, reads included, runs
//! inside a transaction, and a `parking_lot` mutex guarantees at most one
//! logical operation is in flight at a time. The lock is released on every
//! exit path, so the accessor can never stay permanently busy after an
//! error.
//!
//! Batch scripts that want several mutations in one transaction use the
//! explicit `begin_transaction`/`commit_transaction` chaining; while a
//! chained transaction is open, [`SqliteSession::with_transaction`] joins
//! it and leaves commit to the caller.

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use tracing::debug;

struct Session {
    conn: Connection,
    txn_open: bool,
}

/// Thread-safe wrapper around the one live connection.
#[derive(Clone)]
pub struct SqliteSession {
    inner: Arc<Mutex<Session>>,
}

impl SqliteSession {
    /// Open a connection for the given configuration and apply the
    /// engine-level pragmas.
    pub fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        SqliteError::Connection(format!("failed to create directory: {e}"))
                    })?;
                }
            }
            Connection::open(&config.path)?
        };

        configure_pragmas(&conn, config)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Session {
                conn,
                txn_open: false,
            })),
        })
    }

    /// Run `f` inside the transactional critical section.
    ///
    /// Opens an exclusive transaction, commits on success and rolls back on
    /// error. When a chained transaction is already open, `f` joins it and
    /// no commit happens here.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> SqliteResult<T>,
    ) -> SqliteResult<T> {
        let session = self.inner.lock();
        if session.txn_open {
            return f(&session.conn);
        }

        session.conn.execute_batch("BEGIN EXCLUSIVE")?;
        match f(&session.conn) {
            Ok(value) => match session.conn.execute_batch("COMMIT") {
                Ok(()) => Ok(value),
                Err(commit_error) => {
                    let _ = session.conn.execute_batch("ROLLBACK");
                    Err(commit_error.into())
                }
            },
            Err(error) => {
                let _ = session.conn.execute_batch("ROLLBACK");
                Err(error)
            }
        }
    }

    /// Open a chained transaction spanning several `with_transaction`
    /// calls. Commit with [`Self::commit_transaction`].
    pub fn begin_transaction(&self) -> SqliteResult<()> {
        let mut session = self.inner.lock();
        if session.txn_open {
            return Err(SqliteError::Query(
                "a chained transaction is already open".to_string(),
            ));
        }
        session.conn.execute_batch("BEGIN EXCLUSIVE")?;
        session.txn_open = true;
        debug!("chained transaction opened");
        Ok(())
    }

    /// Commit the chained transaction. A failed commit rolls back.
    pub fn commit_transaction(&self) -> SqliteResult<()> {
        let mut session = self.inner.lock();
        if !session.txn_open {
            return Err(SqliteError::Query(
                "no chained transaction to commit".to_string(),
            ));
        }
        session.txn_open = false;
        if let Err(error) = session.conn.execute_batch("COMMIT") {
            let _ = session.conn.execute_batch("ROLLBACK");
            return Err(error.into());
        }
        debug!("chained transaction committed");
        Ok(())
    }

    /// Discard the chained transaction.
    pub fn rollback_transaction(&self) -> SqliteResult<()> {
        let mut session = self.inner.lock();
        if !session.txn_open {
            return Err(SqliteError::Query(
                "no chained transaction to roll back".to_string(),
            ));
        }
        session.txn_open = false;
        session.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

fn configure_pragmas(conn: &Connection, config: &SqliteConfig) -> SqliteResult<()> {
    debug!("configuring SQLite pragmas");
    if config.wal_mode && !config.is_memory() {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }
    if config.foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    }
    conn.execute_batch(&format!("PRAGMA busy_timeout = {};", config.busy_timeout_ms))?;
    conn.execute_batch(&format!("PRAGMA cache_size = {};", config.cache_size))?;
    conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
    Ok(())
}
