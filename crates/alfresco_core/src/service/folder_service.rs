//! Folder helpers.
//!
//! # Invariants
//! - Folder creation always uses the `cmis:folder` base type.
//! - `create_folder_path` only creates the missing suffix of a path.

use super::query_service::{resolve_object_id, ObjectIdSource, QUERY_OBJECT_ID_SOURCES};
use super::RepositoryClient;
use crate::error::{CmisError, CmisResult};
use crate::model::{
    property_ids, BaseType, Folder, ObjectId, OperationContext, Properties, RepositoryObject,
    UnfileObject,
};
use crate::query::folder_by_name_query;
use crate::session::RepositorySession;
use log::{debug, warn};

impl<S: RepositorySession> RepositoryClient<S> {
    /// Finds a folder by exact name, optionally restricted to one parent.
    ///
    /// # Contract
    /// - Returns the first match in repository order, `None` when nothing matches.
    /// - The row's object id is read through the folder type's query name
    ///   for `cmis:objectId`, then the generic fallbacks.
    pub fn get_folder_by_name(
        &self,
        name: &str,
        parent: Option<&Folder>,
    ) -> CmisResult<Option<Folder>> {
        let folder_type = self.session.type_definition(BaseType::Folder.as_str())?;
        let id_query_name = folder_type
            .property_query_name(property_ids::OBJECT_ID)
            .unwrap_or(property_ids::OBJECT_ID);
        let mut sources = vec![ObjectIdSource::QueryName(id_query_name)];
        sources.extend(QUERY_OBJECT_ID_SOURCES);

        let statement = folder_by_name_query(name, parent.map(|folder| folder.id.as_str()));
        let ctx = OperationContext::default();
        let rows = self.session.query(&statement, false, None, &ctx)?;
        debug!(
            "event=get_folder_by_name module=service.folder status=ok rows={}",
            rows.len()
        );

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let id = resolve_object_id(row, &sources).ok_or_else(|| {
            CmisError::InvalidData("folder query row carries no object id".to_string())
        })?;
        self.fetch_folder(&id, &ctx).map(Some)
    }

    /// Creates `name` under `parent`.
    ///
    /// # Errors
    /// - `AlreadyExists` when `parent` already has a child with this name.
    pub fn create_folder(&self, parent: &Folder, name: &str) -> CmisResult<Folder> {
        let mut properties = Properties::new();
        properties.insert(property_ids::NAME.to_string(), name.into());
        properties.insert(
            property_ids::OBJECT_TYPE_ID.to_string(),
            BaseType::Folder.as_str().into(),
        );

        let id = self.session.create_folder(&parent.id, properties)?;
        debug!(
            "event=create_folder module=service.folder status=ok folder_id={}",
            id
        );
        self.fetch_folder(&id, &OperationContext::fresh())
    }

    /// Ensures every segment of `relative_path` exists below `parent` and
    /// returns the deepest folder.
    ///
    /// # Contract
    /// - Empty segments are skipped, so `a//b/` equals `a/b`.
    /// - Idempotent: a second call creates nothing and returns the same folder.
    /// - A non-folder occupying a segment path is a `Constraint` error.
    pub fn create_folder_path(&self, parent: &Folder, relative_path: &str) -> CmisResult<Folder> {
        let ctx = OperationContext::fresh();
        let mut current = parent.clone();
        for segment in relative_path.split('/').filter(|segment| !segment.is_empty()) {
            let path = current.child_path(segment);
            current = match self.session.object_by_path(&path, &ctx) {
                Ok(RepositoryObject::Folder(folder)) => folder,
                Ok(other) => {
                    return Err(CmisError::Constraint(format!(
                        "`{path}` is occupied by a {}",
                        other.base_type().as_str()
                    )))
                }
                Err(CmisError::NotFound(_)) => self.create_folder(&current, segment)?,
                Err(err) => return Err(err),
            };
        }
        Ok(current)
    }

    /// Child folders of `parent` in repository order.
    pub fn list_folders(&self, parent: &Folder, use_cache: bool) -> CmisResult<Vec<Folder>> {
        let ctx = OperationContext::with_cache(use_cache);
        Ok(self
            .session
            .children(&parent.id, &ctx)?
            .into_iter()
            .filter_map(RepositoryObject::into_folder)
            .collect())
    }

    /// Deletes an empty folder.
    ///
    /// # Errors
    /// - `Constraint` when the folder still has children.
    pub fn delete_folder(&self, folder: &Folder) -> CmisResult<()> {
        self.delete_folder_by_id(&folder.id)
    }

    /// Same as [`Self::delete_folder`], addressed by id.
    pub fn delete_folder_by_id(&self, folder_id: &str) -> CmisResult<()> {
        self.session.delete_object(folder_id, true)?;
        debug!(
            "event=delete_folder module=service.folder status=ok folder_id={}",
            folder_id
        );
        Ok(())
    }

    /// Deletes `folder` with all its content and subfolders.
    ///
    /// Returns the ids the session reported as not deleted; they are logged
    /// and otherwise passed through as-is.
    pub fn delete_folder_tree(
        &self,
        folder: &Folder,
        all_versions: bool,
    ) -> CmisResult<Vec<ObjectId>> {
        let failed =
            self.session
                .delete_tree(&folder.id, all_versions, UnfileObject::Delete, true)?;
        if failed.is_empty() {
            debug!(
                "event=delete_folder_tree module=service.folder status=ok folder_id={}",
                folder.id
            );
        } else {
            warn!(
                "event=delete_folder_tree module=service.folder status=partial folder_id={} failed_count={} failed_ids={}",
                folder.id,
                failed.len(),
                failed.join(",")
            );
        }
        Ok(failed)
    }

    /// Deletes every immediate child of `folder`: subfolders as trees,
    /// documents through the document delete path.
    pub fn delete_children(&self, folder: &Folder, all_versions: bool) -> CmisResult<()> {
        let children = self.session.children(&folder.id, &OperationContext::fresh())?;
        for child in children {
            match child {
                RepositoryObject::Folder(subfolder) => {
                    self.delete_folder_tree(&subfolder, all_versions)?;
                }
                RepositoryObject::Document(document) => {
                    self.delete_document(&document.id, all_versions)?;
                }
                other => debug!(
                    "event=delete_children module=service.folder status=skip object_id={} base_type={}",
                    other.id(),
                    other.base_type().as_str()
                ),
            }
        }
        Ok(())
    }
}
