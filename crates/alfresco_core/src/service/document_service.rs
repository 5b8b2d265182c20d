//! Document helpers: create, versioned update, fetch, content, delete.

use super::{RepositoryClient, UpdateOutcome};
use crate::error::{CmisError, CmisResult};
use crate::model::{
    property_ids, AllowableAction, CheckIn, ContentStream, Document, Folder, OperationContext,
    Properties, PropertyValue, VersioningState,
};
use crate::repo::now_epoch_ms;
use crate::session::RepositorySession;
use log::{debug, info, warn};

impl<S: RepositorySession> RepositoryClient<S> {
    /// Creates a document as major version `1.0`.
    ///
    /// # Contract
    /// - `cmis:name` and `cmis:objectTypeId` are always set by the facade
    ///   (`type_id` or the default document type).
    /// - `cmis:creationDate` is set to now unless `properties` carries one.
    /// - The content stream declares exactly `content.len()` bytes.
    ///
    /// # Errors
    /// - `AlreadyExists` when `folder` already has a child named `name`.
    pub fn create_document(
        &self,
        folder: &Folder,
        name: &str,
        content: &[u8],
        mime_type: &str,
        type_id: Option<&str>,
        properties: Option<Properties>,
    ) -> CmisResult<Document> {
        let mut properties = properties.unwrap_or_default();
        properties.insert(property_ids::NAME.to_string(), name.into());
        properties.insert(
            property_ids::OBJECT_TYPE_ID.to_string(),
            type_id.unwrap_or(&self.defaults.document_type).into(),
        );
        properties
            .entry(property_ids::CREATION_DATE.to_string())
            .or_insert_with(|| PropertyValue::DateTime(now_epoch_ms()));

        let stream = ContentStream::from_bytes(Some(name.to_string()), mime_type, content.to_vec());
        let id = self.session.create_document(
            &folder.id,
            properties,
            Some(stream),
            VersioningState::Major,
        )?;
        debug!(
            "event=create_document module=service.document status=ok document_id={} length={}",
            id,
            content.len()
        );
        self.fetch_document(&id, &OperationContext::fresh())
    }

    /// Replaces the content of `document` through checkout/checkin.
    ///
    /// # Contract
    /// - Requires `canCheckOut` on `document`; otherwise `Constraint`.
    /// - Sequence: refresh, check out, fetch the working copy, check in.
    /// - A transient storage failure during check-in discards the working
    ///   copy and yields [`UpdateOutcome::TransientFailure`]. Nothing is retried.
    pub fn update_document(
        &self,
        document: &Document,
        content: &[u8],
        mime_type: &str,
        properties: Option<Properties>,
        major: bool,
        comment: Option<&str>,
    ) -> CmisResult<UpdateOutcome> {
        if !document.can(AllowableAction::CanCheckOut) {
            return Err(CmisError::Constraint(format!(
                "document `{}` cannot be checked out",
                document.id
            )));
        }

        let fresh = OperationContext::fresh();
        let current = self.fetch_document(&document.id, &fresh)?;
        let pwc_id = self.session.check_out(&current.id)?;
        let pwc = self.fetch_document(&pwc_id, &fresh)?;

        let check_in = CheckIn {
            major,
            properties: properties.unwrap_or_default(),
            content: Some(ContentStream::from_bytes(
                Some(current.name.clone()),
                mime_type,
                content.to_vec(),
            )),
            comment: comment.map(ToString::to_string),
        };

        match self.session.check_in(&pwc.id, check_in) {
            Ok(version_id) => {
                info!(
                    "event=update_document module=service.document status=ok document_id={} version_id={} major={}",
                    current.id, version_id, major
                );
                Ok(UpdateOutcome::Updated(
                    self.fetch_document(&version_id, &fresh)?,
                ))
            }
            Err(err) if err.is_transient_storage() => {
                warn!(
                    "event=update_document module=service.document status=transient_failure document_id={} pwc_id={} error={}",
                    current.id, pwc.id, err
                );
                self.session.delete_object(&pwc.id, false)?;
                Ok(UpdateOutcome::TransientFailure)
            }
            Err(err) => Err(err),
        }
    }

    /// Updates properties in place and returns the document fetched fresh.
    pub fn update_document_properties(
        &self,
        document: &Document,
        properties: Properties,
    ) -> CmisResult<Document> {
        let id = self.session.update_properties(&document.id, properties)?;
        debug!(
            "event=update_document_properties module=service.document status=ok document_id={}",
            id
        );
        self.fetch_document(&id, &OperationContext::fresh())
    }

    /// # Errors
    /// - `NotFound` when no object has this id.
    /// - `InvalidArgument` when the object is not a document.
    pub fn get_document(&self, id: &str, use_cache: bool) -> CmisResult<Document> {
        self.fetch_document(id, &OperationContext::with_cache(use_cache))
    }

    /// Whole content of a document; `None` when its length is exactly zero.
    ///
    /// The stream is closed on every path; read failures surface as `Io`.
    pub fn get_document_content(&self, id: &str) -> CmisResult<Option<Vec<u8>>> {
        let document = self.get_document(id, false)?;
        if document.content_length == Some(0) {
            return Ok(None);
        }
        let stream = self.session.content_stream(&document.id)?;
        Ok(Some(stream.read_to_vec()?))
    }

    /// Every version of the document's series, in repository order.
    pub fn get_all_versions(&self, id: &str, use_cache: bool) -> CmisResult<Vec<Document>> {
        self.session
            .all_versions(id, &OperationContext::with_cache(use_cache))
    }

    /// First version whose label equals `version_label`.
    pub fn get_document_by_version(
        &self,
        id: &str,
        version_label: &str,
        use_cache: bool,
    ) -> CmisResult<Option<Document>> {
        Ok(self
            .get_all_versions(id, use_cache)?
            .into_iter()
            .find(|version| version.version_label() == Some(version_label)))
    }

    pub fn delete_document(&self, id: &str, all_versions: bool) -> CmisResult<()> {
        self.session.delete_object(id, all_versions)?;
        debug!(
            "event=delete_document module=service.document status=ok document_id={} all_versions={}",
            id, all_versions
        );
        Ok(())
    }

    /// Deletes every version of the series labelled `version_label`; no-op
    /// when none matches.
    pub fn delete_document_by_version(&self, id: &str, version_label: &str) -> CmisResult<()> {
        let matching = self
            .get_all_versions(id, false)?
            .into_iter()
            .filter(|version| version.version_label() == Some(version_label));
        for version in matching {
            self.session.delete_object(&version.id, false)?;
            debug!(
                "event=delete_document_version module=service.document status=ok document_id={} version_label={}",
                version.id, version_label
            );
        }
        Ok(())
    }
}
