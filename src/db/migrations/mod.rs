//! Schema steps for the news database, tracked in `PRAGMA user_version`.
//!
//! Steps are applied in order inside one transaction; a database written by a
//! newer build is refused rather than downgraded.

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::time::Instant;
use tracing::{debug, info};

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by `version`, strictly increasing.
const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "articles, accounts and votes",
    sql: include_str!("0001_init.sql"),
}];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Where a database stands relative to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaState {
    Current,
    Behind { from: u32 },
    Ahead { found: u32 },
}

fn schema_state(found: u32) -> SchemaState {
    let latest = latest_version();
    match found.cmp(&latest) {
        std::cmp::Ordering::Equal => SchemaState::Current,
        std::cmp::Ordering::Less => SchemaState::Behind { from: found },
        std::cmp::Ordering::Greater => SchemaState::Ahead { found },
    }
}

/// Bring `conn` up to [`latest_version`].
///
/// # Errors
///
/// [`Error::UnsupportedSchemaVersion`] when the file was written by a newer
/// build, or [`Error::Db`] when a step fails (nothing is committed then).
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let from = match schema_state(current_user_version(conn)?) {
        SchemaState::Current => {
            debug!(version = latest_version(), "News schema is current");
            return Ok(());
        }
        SchemaState::Ahead { found } => {
            return Err(Error::UnsupportedSchemaVersion {
                db_version: found,
                latest_supported: latest_version(),
            });
        }
        SchemaState::Behind { from } => from,
    };

    let t0 = Instant::now();
    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > from) {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(version = step.version, name = step.name, "Applied schema step");
    }
    tx.commit()?;

    info!(
        from,
        to = latest_version(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "News schema upgraded"
    );
    Ok(())
}

pub(crate) fn current_user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
