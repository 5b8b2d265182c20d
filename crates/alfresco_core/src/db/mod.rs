//! On-disk store behind the local repository session.
//!
//! # Responsibility
//! - Open the store file (or an in-memory store) with the pragmas the
//!   object tables depend on.
//! - Bring the schema and the seeded CMIS type registry up to date.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A store handed out by `open_db` carries the four CMIS base types.
//! - `DbError` describes the store file; the session maps it into
//!   `CmisError` (lock contention becomes `Storage`, the rest `Db`).

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// Store file could not be opened or configured.
    Open {
        location: String,
        source: rusqlite::Error,
    },
    /// A schema step failed; none of the pending steps were kept.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// Store was written by a newer client build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Schema is current but a CMIS base type row is gone.
    MissingBaseType(&'static str),
    Sqlite(rusqlite::Error),
}

impl DbError {
    /// SQLite failure underneath this error, if any.
    pub fn sqlite(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::Open { source, .. } | Self::Migration { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingBaseType(_) => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { location, source } => {
                write!(f, "cannot open repository store `{location}`: {source}")
            }
            Self::Migration {
                version,
                name,
                source,
            } => write!(
                f,
                "repository schema step {version} ({name}) failed: {source}"
            ),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "repository store schema {db_version} was written by a newer client (this one supports up to {latest_supported})"
            ),
            Self::MissingBaseType(type_id) => {
                write!(f, "repository store has no `{type_id}` base type")
            }
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.sqlite().map(|err| err as &(dyn Error + 'static))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
