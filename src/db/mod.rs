//! SQLite storage bootstrap shared by the article store and the vote ledger.
//!
//! # Invariants
//! - Callers never see a connection before migrations succeed.
//! - Every statement runs while holding the single connection lock, so the
//!   scheduled ingestion run and reader requests in the same process are
//!   serialized per operation.

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{error, info};

pub mod migrations;

/// Cloneable handle to one migrated SQLite connection.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens a SQLite database file and applies all pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let started_at = Instant::now();
        let path = path.as_ref();
        info!(path = %path.display(), "Opening database");

        let conn = Connection::open(path).map_err(|err| {
            error!(
                duration_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Failed to open database file"
            );
            err
        })?;
        Self::bootstrap(conn, started_at)
    }

    /// Opens an in-memory SQLite database and applies all pending migrations.
    pub fn open_in_memory() -> Result<Self> {
        let started_at = Instant::now();
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, started_at)
    }

    fn bootstrap(mut conn: Connection, started_at: Instant) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        if let Err(err) = migrations::apply_migrations(&mut conn) {
            error!(
                duration_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Database bootstrap failed"
            );
            return Err(err);
        }
        info!(
            duration_ms = started_at.elapsed().as_millis() as u64,
            schema_version = migrations::latest_version(),
            "Database ready"
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Exclusive access to the connection. A poisoned lock is recovered: the
    /// connection itself stays consistent because every write is transactional.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
