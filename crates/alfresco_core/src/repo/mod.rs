//! Persistence layer of the local repository.
//!
//! # Responsibility
//! - Define data access contracts for objects, types and custom properties.
//! - Isolate SQLite query details from the session's CMIS semantics.
//!
//! # Invariants
//! - Repositories never decide CMIS rules (naming, versioning); they only
//!   store and load rows. The local session owns those rules.
//! - Repositories are constructed over a migrated connection or transaction.

use crate::db::migrations::latest_version;
use crate::error::{CmisError, CmisResult};
use rusqlite::Connection;

pub mod object_repo;
pub mod property_repo;
pub mod type_repo;

/// Verifies the connection carries the schema this build expects.
///
/// # Errors
/// - `InvalidData` when `PRAGMA user_version` differs from the latest migration.
pub fn ensure_connection_ready(conn: &Connection) -> CmisResult<()> {
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected = latest_version();
    if actual != expected {
        return Err(CmisError::InvalidData(format!(
            "local repository requires schema version {expected}, got {actual}"
        )));
    }
    Ok(())
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_flag(value: i64, column: &str) -> CmisResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CmisError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

/// Current wall clock in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
