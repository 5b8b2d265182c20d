//! Client facade over a CMIS content repository (Alfresco).
//!
//! A [`RepositoryClient`] wraps one explicit [`RepositorySession`]: either a
//! remote [`BrowserBindingSession`] or the SQLite-backed
//! [`LocalRepositorySession`].

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod search;
pub mod service;
pub mod session;

pub use config::{BindingType, SessionConfig};
pub use error::{CmisError, CmisResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings};
pub use model::{
    property_ids, AllowableAction, BaseType, CheckIn, ContentStream, Document, Folder,
    IncludeRelationships, ObjectId, OperationContext, Properties, PropertyValue, QueryProperty,
    QueryRow, Relationship, RepositoryInfo, RepositoryObject, TypeDefinition, UnfileObject,
    VersioningState,
};
pub use service::{
    ClientDefaults, RepositoryClient, UpdateOutcome, DEFAULT_DOCUMENT_TYPE,
    DEFAULT_RELATIONSHIP_TYPE,
};
pub use session::{
    create_session, open_session, BrowserBindingSession, LocalRepositorySession,
    RepositorySession,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
