//! Repository client facade.
//!
//! # Responsibility
//! - Offer folder, document, relationship and query helpers over one
//!   explicit [`RepositorySession`] handle.
//! - Build property bags and query strings; leave protocol, versioning and
//!   query semantics to the session.
//!
//! # Invariants
//! - The facade holds no state besides the session and its defaults.
//! - Errors propagate unchanged, except a transient storage failure during
//!   check-in, which becomes [`UpdateOutcome::TransientFailure`].

use crate::config::SessionConfig;
use crate::error::{CmisError, CmisResult};
use crate::model::{Document, Folder, OperationContext, RepositoryObject};
use crate::session::{open_session, BrowserBindingSession, RepositorySession};

mod document_service;
mod folder_service;
mod query_service;
mod relationship_service;

pub use query_service::{resolve_object_id, ObjectIdSource, QUERY_OBJECT_ID_SOURCES};

/// Alfresco `cmiscustom` document type, a creatable subtype of `cmis:document`.
pub const DEFAULT_DOCUMENT_TYPE: &str = "D:cmiscustom:document";
/// Alfresco `cmiscustom` association, a creatable subtype of `cmis:relationship`.
pub const DEFAULT_RELATIONSHIP_TYPE: &str = "R:cmiscustom:assoc";

/// Types used when a caller does not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDefaults {
    pub document_type: String,
    pub relationship_type: String,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            document_type: DEFAULT_DOCUMENT_TYPE.to_string(),
            relationship_type: DEFAULT_RELATIONSHIP_TYPE.to_string(),
        }
    }
}

/// Result of a content update through checkout/checkin.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The new version, fetched fresh.
    Updated(Document),
    /// Check-in hit a transient storage failure; the working copy was
    /// discarded and the whole update may be retried.
    TransientFailure,
}

impl UpdateOutcome {
    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::Updated(document) => Some(document),
            Self::TransientFailure => None,
        }
    }
}

/// Facade over one repository session.
#[derive(Debug)]
pub struct RepositoryClient<S: RepositorySession> {
    session: S,
    defaults: ClientDefaults,
}

impl RepositoryClient<BrowserBindingSession> {
    /// Opens a browser-binding session from configuration.
    ///
    /// # Errors
    /// - `Connection` when the endpoint is unreachable, rejects the
    ///   credentials, or lists no repository.
    /// - `NotSupported` for bindings other than the browser binding.
    pub fn connect(config: &SessionConfig) -> CmisResult<Self> {
        Ok(Self::new(open_session(config)?))
    }
}

impl<S: RepositorySession> RepositoryClient<S> {
    pub fn new(session: S) -> Self {
        Self::with_defaults(session, ClientDefaults::default())
    }

    pub fn with_defaults(session: S, defaults: ClientDefaults) -> Self {
        Self { session, defaults }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn defaults(&self) -> &ClientDefaults {
        &self.defaults
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Loads the repository root folder.
    pub fn root_folder(&self) -> CmisResult<Folder> {
        let root_id = self.session.repository_info().root_folder_id.clone();
        self.fetch_folder(&root_id, &OperationContext::fresh())
    }

    fn fetch_folder(&self, id: &str, ctx: &OperationContext) -> CmisResult<Folder> {
        match self.session.object(id, ctx)? {
            RepositoryObject::Folder(folder) => Ok(folder),
            other => Err(CmisError::InvalidArgument(format!(
                "`{id}` is a {}, not a folder",
                other.base_type().as_str()
            ))),
        }
    }

    fn fetch_document(&self, id: &str, ctx: &OperationContext) -> CmisResult<Document> {
        match self.session.object(id, ctx)? {
            RepositoryObject::Document(document) => Ok(document),
            other => Err(CmisError::InvalidArgument(format!(
                "`{id}` is a {}, not a document",
                other.base_type().as_str()
            ))),
        }
    }
}
