//! Error taxonomy shared by sessions and the repository facade.
//!
//! # Responsibility
//! - Give every session implementation one error contract to report into.
//! - Keep server-reported fault classes distinguishable for callers.
//!
//! # Invariants
//! - The facade translates exactly one class (`Storage` during check-in);
//!   every other variant reaches callers unchanged.
//! - `code()` values are stable identifiers.

use crate::db::DbError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CmisResult<T> = Result<T, CmisError>;

/// Error reported by repository sessions and the facade.
#[derive(Debug)]
pub enum CmisError {
    /// Create rejected because a sibling with the same name exists.
    AlreadyExists(String),
    /// Lookup by id or path found nothing.
    NotFound(String),
    /// Structural or versioning rule violated (e.g. non-empty folder delete).
    Constraint(String),
    /// Session establishment failed.
    Connection(String),
    /// Content stream could not be read.
    Io(std::io::Error),
    /// Transient storage failure. Retrying the whole operation may succeed.
    Storage(String),
    /// Argument or query rejected.
    InvalidArgument(String),
    PermissionDenied(String),
    NotSupported(String),
    /// Any other fault reported by the repository.
    Runtime(String),
    Http(reqwest::Error),
    Json(serde_json::Error),
    Db(DbError),
    /// Repository answered with a shape that cannot be decoded.
    InvalidData(String),
}

impl CmisError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Constraint(_) => "CONSTRAINT",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Storage(_) => "STORAGE",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::NotSupported(_) => "NOT_SUPPORTED",
            Self::Runtime(_) => "RUNTIME",
            Self::Http(_) => "HTTP_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Db(_) => "DB_ERROR",
            Self::InvalidData(_) => "INVALID_DATA",
        }
    }

    /// Whether this is the transient storage class.
    pub fn is_transient_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl Display for CmisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists(message) => write!(f, "object already exists: {message}"),
            Self::NotFound(message) => write!(f, "object not found: {message}"),
            Self::Constraint(message) => write!(f, "constraint violation: {message}"),
            Self::Connection(message) => write!(f, "connection failed: {message}"),
            Self::Io(err) => write!(f, "content stream read failed: {err}"),
            Self::Storage(message) => write!(f, "storage failure: {message}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::PermissionDenied(message) => write!(f, "permission denied: {message}"),
            Self::NotSupported(message) => write!(f, "not supported: {message}"),
            Self::Runtime(message) => write!(f, "repository runtime error: {message}"),
            Self::Http(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid repository data: {message}"),
        }
    }
}

impl Error for CmisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CmisError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<reqwest::Error> for CmisError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<serde_json::Error> for CmisError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<DbError> for CmisError {
    fn from(value: DbError) -> Self {
        match value.sqlite() {
            Some(err) if is_transient_sqlite_failure(err) => Self::Storage(value.to_string()),
            _ => Self::Db(value),
        }
    }
}

impl From<rusqlite::Error> for CmisError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

fn is_transient_sqlite_failure(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
        ),
        _ => false,
    }
}

/// Maps a CMIS exception name (browser binding `exception` field) to the taxonomy.
pub fn from_cmis_exception(exception: &str, message: String) -> CmisError {
    match exception {
        "contentAlreadyExists" | "nameConstraintViolation" => CmisError::AlreadyExists(message),
        "objectNotFound" => CmisError::NotFound(message),
        "constraint" | "versioning" | "updateConflict" => CmisError::Constraint(message),
        "storage" => CmisError::Storage(message),
        "invalidArgument" | "filterNotValid" => CmisError::InvalidArgument(message),
        "permissionDenied" | "unauthorized" => CmisError::PermissionDenied(message),
        "notSupported" | "streamNotSupported" => CmisError::NotSupported(message),
        _ => CmisError::Runtime(message),
    }
}
