//! Query helpers and object-id extraction from result rows.
//!
//! # Invariants
//! - `max_items = 0` asks for the first page at the repository's default size.
//! - Generated statements escape their literals.

use super::RepositoryClient;
use crate::error::{CmisError, CmisResult};
use crate::model::{property_ids, Folder, OperationContext, PropertyValue, QueryRow, RepositoryObject};
use crate::query::{documents_containing_query, documents_in_folder_query};
use crate::session::RepositorySession;
use log::debug;

/// Where a result row may carry the object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectIdSource<'a> {
    PropertyId(&'a str),
    QueryName(&'a str),
}

/// Fallback chain for rows of `SELECT *` and aliased `d.*` statements.
pub const QUERY_OBJECT_ID_SOURCES: [ObjectIdSource<'static>; 2] = [
    ObjectIdSource::PropertyId(property_ids::OBJECT_ID),
    ObjectIdSource::QueryName("d.cmis:objectId"),
];

/// First object id found by walking `sources` in order.
pub fn resolve_object_id(row: &QueryRow, sources: &[ObjectIdSource<'_>]) -> Option<String> {
    sources.iter().find_map(|source| {
        let property = match source {
            ObjectIdSource::PropertyId(id) => row.property_by_id(id),
            ObjectIdSource::QueryName(query_name) => row.property_by_query_name(query_name),
        }?;
        property
            .first_value()
            .and_then(PropertyValue::as_str)
            .map(ToString::to_string)
    })
}

impl<S: RepositorySession> RepositoryClient<S> {
    /// Runs `statement` and fetches the object behind every row.
    ///
    /// # Contract
    /// - `max_items = 0` returns the first page at the default page size;
    ///   any other value is the exact page size.
    /// - Each row's id is resolved through [`QUERY_OBJECT_ID_SOURCES`].
    pub fn execute_query(
        &self,
        statement: &str,
        max_items: u32,
        use_cache: bool,
    ) -> CmisResult<Vec<RepositoryObject>> {
        let ctx = OperationContext::with_cache(use_cache);
        let page_size = (max_items > 0).then_some(max_items);
        let rows = self.session.query(statement, false, page_size, &ctx)?;
        debug!(
            "event=execute_query module=service.query status=ok rows={}",
            rows.len()
        );

        rows.iter()
            .map(|row| {
                let id = resolve_object_id(row, &QUERY_OBJECT_ID_SOURCES).ok_or_else(|| {
                    CmisError::InvalidData("query row carries no object id".to_string())
                })?;
                self.session.object(&id, &ctx)
            })
            .collect()
    }

    /// Full-text search over document names and bodies.
    pub fn find_documents_by_text(
        &self,
        keyword: &str,
        max_items: u32,
        use_cache: bool,
    ) -> CmisResult<Vec<RepositoryObject>> {
        self.execute_query(&documents_containing_query(keyword), max_items, use_cache)
    }

    /// Documents filed directly in `folder`.
    pub fn find_documents_in_folder(
        &self,
        folder: &Folder,
        max_items: u32,
        use_cache: bool,
    ) -> CmisResult<Vec<RepositoryObject>> {
        self.execute_query(&documents_in_folder_query(&folder.id), max_items, use_cache)
    }
}
