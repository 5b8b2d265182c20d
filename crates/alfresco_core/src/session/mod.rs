//! Repository session contract and its implementations.
//!
//! # Responsibility
//! - Define the one seam the facade talks to: [`RepositorySession`].
//! - Host the remote browser binding and the embedded SQLite repository.
//!
//! # Invariants
//! - Sessions own protocol, marshaling, versioning and query semantics.
//! - Object-returning calls honor `OperationContext::cache_enabled`; a
//!   session without a cache always reads fresh.
//! - Mutations return the id of the affected/new object; callers fetch the
//!   object themselves.

use crate::config::{BindingType, SessionConfig};
use crate::error::{CmisError, CmisResult};
use crate::model::{
    CheckIn, ContentStream, Document, ObjectId, OperationContext, Properties, QueryRow,
    RepositoryInfo, RepositoryObject, TypeDefinition, UnfileObject, VersioningState,
};
use log::{error, info};
use std::time::Instant;

mod browser;
mod browser_codec;
mod local;

pub use browser::BrowserBindingSession;
pub use local::LocalRepositorySession;

/// Authenticated handle to one repository.
pub trait RepositorySession {
    /// Identity of the bound repository.
    fn repository_info(&self) -> &RepositoryInfo;
    /// Loads one type definition, including inherited property definitions.
    fn type_definition(&self, type_id: &str) -> CmisResult<TypeDefinition>;
    /// Loads one object by id.
    fn object(&self, id: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject>;
    /// Loads one object by absolute path.
    fn object_by_path(&self, path: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject>;
    /// Lists the direct children of a folder in repository order.
    fn children(&self, folder_id: &str, ctx: &OperationContext)
        -> CmisResult<Vec<RepositoryObject>>;
    /// Executes a CMIS-QL statement. `max_items = None` returns the first
    /// page at the repository's default size.
    fn query(
        &self,
        statement: &str,
        search_all_versions: bool,
        max_items: Option<u32>,
        ctx: &OperationContext,
    ) -> CmisResult<Vec<QueryRow>>;
    fn create_folder(&self, parent_id: &str, properties: Properties) -> CmisResult<ObjectId>;
    fn create_document(
        &self,
        folder_id: &str,
        properties: Properties,
        content: Option<ContentStream>,
        versioning_state: VersioningState,
    ) -> CmisResult<ObjectId>;
    fn create_relationship(&self, properties: Properties) -> CmisResult<ObjectId>;
    /// Updates properties in place; returns the (possibly new) object id.
    fn update_properties(&self, id: &str, properties: Properties) -> CmisResult<ObjectId>;
    /// Checks out a document; returns the private working copy id.
    fn check_out(&self, id: &str) -> CmisResult<ObjectId>;
    /// Checks in a private working copy; returns the new version id.
    fn check_in(&self, pwc_id: &str, check_in: CheckIn) -> CmisResult<ObjectId>;
    /// Deletes one object. Deleting a private working copy cancels the checkout.
    fn delete_object(&self, id: &str, all_versions: bool) -> CmisResult<()>;
    /// Deletes a folder subtree; returns the ids that could not be deleted.
    fn delete_tree(
        &self,
        folder_id: &str,
        all_versions: bool,
        unfile: UnfileObject,
        continue_on_failure: bool,
    ) -> CmisResult<Vec<ObjectId>>;
    fn content_stream(&self, id: &str) -> CmisResult<ContentStream>;
    /// Every version of the series `id` belongs to, newest first.
    fn all_versions(&self, id: &str, ctx: &OperationContext) -> CmisResult<Vec<Document>>;
}

impl<T: RepositorySession + ?Sized> RepositorySession for &T {
    fn repository_info(&self) -> &RepositoryInfo {
        (**self).repository_info()
    }

    fn type_definition(&self, type_id: &str) -> CmisResult<TypeDefinition> {
        (**self).type_definition(type_id)
    }

    fn object(&self, id: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        (**self).object(id, ctx)
    }

    fn object_by_path(&self, path: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        (**self).object_by_path(path, ctx)
    }

    fn children(
        &self,
        folder_id: &str,
        ctx: &OperationContext,
    ) -> CmisResult<Vec<RepositoryObject>> {
        (**self).children(folder_id, ctx)
    }

    fn query(
        &self,
        statement: &str,
        search_all_versions: bool,
        max_items: Option<u32>,
        ctx: &OperationContext,
    ) -> CmisResult<Vec<QueryRow>> {
        (**self).query(statement, search_all_versions, max_items, ctx)
    }

    fn create_folder(&self, parent_id: &str, properties: Properties) -> CmisResult<ObjectId> {
        (**self).create_folder(parent_id, properties)
    }

    fn create_document(
        &self,
        folder_id: &str,
        properties: Properties,
        content: Option<ContentStream>,
        versioning_state: VersioningState,
    ) -> CmisResult<ObjectId> {
        (**self).create_document(folder_id, properties, content, versioning_state)
    }

    fn create_relationship(&self, properties: Properties) -> CmisResult<ObjectId> {
        (**self).create_relationship(properties)
    }

    fn update_properties(&self, id: &str, properties: Properties) -> CmisResult<ObjectId> {
        (**self).update_properties(id, properties)
    }

    fn check_out(&self, id: &str) -> CmisResult<ObjectId> {
        (**self).check_out(id)
    }

    fn check_in(&self, pwc_id: &str, check_in: CheckIn) -> CmisResult<ObjectId> {
        (**self).check_in(pwc_id, check_in)
    }

    fn delete_object(&self, id: &str, all_versions: bool) -> CmisResult<()> {
        (**self).delete_object(id, all_versions)
    }

    fn delete_tree(
        &self,
        folder_id: &str,
        all_versions: bool,
        unfile: UnfileObject,
        continue_on_failure: bool,
    ) -> CmisResult<Vec<ObjectId>> {
        (**self).delete_tree(folder_id, all_versions, unfile, continue_on_failure)
    }

    fn content_stream(&self, id: &str) -> CmisResult<ContentStream> {
        (**self).content_stream(id)
    }

    fn all_versions(&self, id: &str, ctx: &OperationContext) -> CmisResult<Vec<Document>> {
        (**self).all_versions(id, ctx)
    }
}

/// Opens a browser-binding session for `user` against `url`, bound to the
/// first repository the endpoint lists.
///
/// # Errors
/// - `Connection` when the endpoint is unreachable, rejects the
///   credentials, or lists no repository.
pub fn create_session(user: &str, password: &str, url: &str) -> CmisResult<BrowserBindingSession> {
    open_session(&SessionConfig::new(user, password, url))
}

/// Opens a session from explicit configuration.
///
/// # Errors
/// - `NotSupported` for bindings other than the browser binding.
/// - `Connection` as for [`create_session`].
pub fn open_session(config: &SessionConfig) -> CmisResult<BrowserBindingSession> {
    let started_at = Instant::now();
    info!(
        "event=session_open module=session status=start binding={}",
        config.binding.as_str()
    );

    if config.binding != BindingType::Browser {
        error!(
            "event=session_open module=session status=error binding={} error_code=binding_not_supported",
            config.binding.as_str()
        );
        return Err(CmisError::NotSupported(format!(
            "binding `{}` is not available; use the browser binding",
            config.binding.as_str()
        )));
    }

    match BrowserBindingSession::connect(config) {
        Ok(session) => {
            info!(
                "event=session_open module=session status=ok binding=browser repository_id={} duration_ms={}",
                session.repository_info().id,
                started_at.elapsed().as_millis()
            );
            Ok(session)
        }
        Err(err) => {
            error!(
                "event=session_open module=session status=error binding=browser duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}
