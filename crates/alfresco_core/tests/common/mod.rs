#![allow(dead_code)]

pub mod loopback;

use alfresco_core::{
    CheckIn, CmisError, CmisResult, ContentStream, Document, Folder, LocalRepositorySession,
    ObjectId, OperationContext, Properties, QueryRow, RepositoryClient, RepositoryInfo,
    RepositoryObject, RepositorySession, TypeDefinition, UnfileObject, VersioningState,
};
use std::cell::Cell;
use std::io::{self, ErrorKind, Read};

pub type LocalClient = RepositoryClient<LocalRepositorySession>;

pub fn local_client() -> LocalClient {
    RepositoryClient::new(LocalRepositorySession::open_in_memory("admin").unwrap())
}

/// Fresh folder directly under the root.
pub fn workspace(client: &RepositoryClient<impl RepositorySession>, name: &str) -> Folder {
    let root = client.root_folder().unwrap();
    client.create_folder(&root, name).unwrap()
}

pub fn text_document(
    client: &RepositoryClient<impl RepositorySession>,
    folder: &Folder,
    name: &str,
    body: &str,
) -> Document {
    client
        .create_document(folder, name, body.as_bytes(), "text/plain", None, None)
        .unwrap()
}

pub fn version_labels(documents: &[Document]) -> Vec<String> {
    let mut labels = documents
        .iter()
        .filter_map(|document| document.version_label().map(ToString::to_string))
        .collect::<Vec<_>>();
    labels.sort();
    labels
}

/// Local session with injectable faults.
pub struct FaultySession {
    inner: LocalRepositorySession,
    check_in_failures: Cell<u32>,
    content_fails_after: Option<usize>,
}

impl FaultySession {
    fn over_memory() -> Self {
        Self {
            inner: LocalRepositorySession::open_in_memory("admin").unwrap(),
            check_in_failures: Cell::new(0),
            content_fails_after: None,
        }
    }

    /// The next `failures` check-ins fail with a storage error.
    pub fn failing_check_ins(failures: u32) -> Self {
        let session = Self::over_memory();
        session.check_in_failures.set(failures);
        session
    }

    /// Content readers yield `bytes` bytes, then a connection reset.
    pub fn content_failing_after(bytes: usize) -> Self {
        Self {
            content_fails_after: Some(bytes),
            ..Self::over_memory()
        }
    }
}

struct ResetAfter {
    inner: Box<dyn Read + Send>,
    remaining: usize,
}

impl Read for ResetAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(
                ErrorKind::ConnectionReset,
                "content connection reset",
            ));
        }
        let limit = buf.len().min(self.remaining);
        let read = self.inner.read(&mut buf[..limit])?;
        self.remaining -= read;
        Ok(read)
    }
}

impl RepositorySession for FaultySession {
    fn repository_info(&self) -> &RepositoryInfo {
        self.inner.repository_info()
    }

    fn type_definition(&self, type_id: &str) -> CmisResult<TypeDefinition> {
        self.inner.type_definition(type_id)
    }

    fn object(&self, id: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        self.inner.object(id, ctx)
    }

    fn object_by_path(&self, path: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        self.inner.object_by_path(path, ctx)
    }

    fn children(
        &self,
        folder_id: &str,
        ctx: &OperationContext,
    ) -> CmisResult<Vec<RepositoryObject>> {
        self.inner.children(folder_id, ctx)
    }

    fn query(
        &self,
        statement: &str,
        search_all_versions: bool,
        max_items: Option<u32>,
        ctx: &OperationContext,
    ) -> CmisResult<Vec<QueryRow>> {
        self.inner
            .query(statement, search_all_versions, max_items, ctx)
    }

    fn create_folder(&self, parent_id: &str, properties: Properties) -> CmisResult<ObjectId> {
        self.inner.create_folder(parent_id, properties)
    }

    fn create_document(
        &self,
        folder_id: &str,
        properties: Properties,
        content: Option<ContentStream>,
        versioning_state: VersioningState,
    ) -> CmisResult<ObjectId> {
        self.inner
            .create_document(folder_id, properties, content, versioning_state)
    }

    fn create_relationship(&self, properties: Properties) -> CmisResult<ObjectId> {
        self.inner.create_relationship(properties)
    }

    fn update_properties(&self, id: &str, properties: Properties) -> CmisResult<ObjectId> {
        self.inner.update_properties(id, properties)
    }

    fn check_out(&self, id: &str) -> CmisResult<ObjectId> {
        self.inner.check_out(id)
    }

    fn check_in(&self, pwc_id: &str, check_in: CheckIn) -> CmisResult<ObjectId> {
        let left = self.check_in_failures.get();
        if left > 0 {
            self.check_in_failures.set(left - 1);
            return Err(CmisError::Storage("database is locked".to_string()));
        }
        self.inner.check_in(pwc_id, check_in)
    }

    fn delete_object(&self, id: &str, all_versions: bool) -> CmisResult<()> {
        self.inner.delete_object(id, all_versions)
    }

    fn delete_tree(
        &self,
        folder_id: &str,
        all_versions: bool,
        unfile: UnfileObject,
        continue_on_failure: bool,
    ) -> CmisResult<Vec<ObjectId>> {
        self.inner
            .delete_tree(folder_id, all_versions, unfile, continue_on_failure)
    }

    fn content_stream(&self, id: &str) -> CmisResult<ContentStream> {
        let stream = self.inner.content_stream(id)?;
        let Some(remaining) = self.content_fails_after else {
            return Ok(stream);
        };
        let file_name = stream.file_name.clone();
        let length = stream.length;
        let mime_type = stream.mime_type.clone();
        Ok(ContentStream::new(
            file_name,
            length,
            mime_type,
            Box::new(ResetAfter {
                inner: stream.into_reader(),
                remaining,
            }),
        ))
    }

    fn all_versions(&self, id: &str, ctx: &OperationContext) -> CmisResult<Vec<Document>> {
        self.inner.all_versions(id, ctx)
    }
}
