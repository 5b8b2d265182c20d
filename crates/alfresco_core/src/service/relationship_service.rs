//! Relationship helpers.

use super::RepositoryClient;
use crate::error::CmisResult;
use crate::model::{
    property_ids, Document, IncludeRelationships, ObjectId, OperationContext, Properties,
};
use crate::session::RepositorySession;
use log::debug;

impl<S: RepositorySession> RepositoryClient<S> {
    /// Links `source` to `target` with `relationship_type`, or the default
    /// association type. Duplicates are not detected.
    pub fn relate_documents(
        &self,
        source: &Document,
        target: &Document,
        relationship_type: Option<&str>,
    ) -> CmisResult<ObjectId> {
        let mut properties = Properties::new();
        properties.insert(
            property_ids::OBJECT_TYPE_ID.to_string(),
            relationship_type
                .unwrap_or(&self.defaults.relationship_type)
                .into(),
        );
        properties.insert(property_ids::SOURCE_ID.to_string(), source.id.as_str().into());
        properties.insert(property_ids::TARGET_ID.to_string(), target.id.as_str().into());

        let id = self.session.create_relationship(properties)?;
        debug!(
            "event=relate_documents module=service.relationship status=ok relationship_id={} source_id={} target_id={}",
            id, source.id, target.id
        );
        Ok(id)
    }

    /// Loads a document with the relationships it is the source of.
    pub fn get_document_with_relationships(
        &self,
        id: &str,
        use_cache: bool,
    ) -> CmisResult<Document> {
        let ctx = OperationContext::with_cache(use_cache)
            .include_relationships(IncludeRelationships::Source);
        self.fetch_document(id, &ctx)
    }
}
