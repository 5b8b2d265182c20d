//! Embedded SQLite repository behind the [`RepositorySession`] contract.
//!
//! # Responsibility
//! - Enforce CMIS rules (naming, filing, versioning) over the `repo` layer.
//! - Bootstrap repository identity and the root folder on first open.
//! - Evaluate the supported CMIS-QL subset locally.
//!
//! # Invariants
//! - Every mutation runs inside one `IMMEDIATE` transaction.
//! - Document ids are `<series>;<label>`; the working copy is `<series>;pwc`.
//! - A series has at most one latest version and at most one working copy.
//! - Sibling names are unique among visible children of a folder.

mod query;

use super::RepositorySession;
use crate::db::{open_db, open_db_in_memory};
use crate::error::{CmisError, CmisResult};
use crate::model::{
    property_ids, AllowableAction, BaseType, CheckIn, ContentStream, Document, IncludeRelationships,
    ObjectId, OperationContext, Properties, PropertyValue, QueryRow, Relationship,
    RepositoryInfo, RepositoryObject, TypeDefinition, UnfileObject, VersioningState,
};
use crate::query::parse_statement;
use crate::repo::object_repo::{
    ObjectRecord, ObjectRepository, RelationshipEnd, SqliteObjectRepository,
};
use crate::repo::property_repo::{copy_properties, load_properties, upsert_properties};
use crate::repo::type_repo::{SqliteTypeRepository, TypeRepository};
use crate::repo::{ensure_connection_ready, now_epoch_ms};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

const PWC_LABEL: &str = "pwc";
const ROOT_FOLDER_NAME: &str = "Company Home";
const SYSTEM_USER: &str = "System";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const META_REPOSITORY_ID: &str = "repository_id";
const META_ROOT_FOLDER_ID: &str = "root_folder_id";

/// Repository session stored in one SQLite database.
#[derive(Debug)]
pub struct LocalRepositorySession {
    conn: Connection,
    user: String,
    info: RepositoryInfo,
}

impl LocalRepositorySession {
    /// Opens (or creates) a repository database file acting as `user`.
    pub fn open(path: impl AsRef<Path>, user: &str) -> CmisResult<Self> {
        Self::from_connection(open_db(path)?, user)
    }

    /// Opens a throwaway in-memory repository acting as `user`.
    pub fn open_in_memory(user: &str) -> CmisResult<Self> {
        Self::from_connection(open_db_in_memory()?, user)
    }

    /// Binds to an already migrated connection.
    ///
    /// # Errors
    /// - `InvalidData` when the schema version does not match this build.
    pub fn from_connection(conn: Connection, user: &str) -> CmisResult<Self> {
        ensure_connection_ready(&conn)?;
        let info = bootstrap_repository(&conn)?;
        info!(
            "event=session_open module=session.local status=ok repository_id={} root_folder_id={}",
            info.id, info.root_folder_id
        );
        Ok(Self {
            conn,
            user: user.to_string(),
            info,
        })
    }

    /// Registers a custom document, folder, relationship or secondary type.
    ///
    /// # Errors
    /// - `AlreadyExists` when the id is taken.
    /// - `InvalidArgument` when the parent is unknown or has another base type.
    pub fn define_type(&self, definition: &TypeDefinition) -> CmisResult<()> {
        self.write("define_type", |tx| {
            SqliteTypeRepository::new(tx).insert_type(definition)
        })
    }

    fn write<T>(
        &self,
        operation: &str,
        body: impl FnOnce(&Connection) -> CmisResult<T>,
    ) -> CmisResult<T> {
        let started_at = Instant::now();
        let result = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(CmisError::from)
            .and_then(|tx| {
                let value = body(&tx)?;
                tx.commit()?;
                Ok(value)
            });

        match &result {
            Ok(_) => info!(
                "event=local_write module=session.local status=ok operation={} duration_ms={}",
                operation,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=local_write module=session.local status=error operation={} duration_ms={} error_code={} error={}",
                operation,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    fn stamp(&self, record: &mut ObjectRecord, creation_date: Option<i64>, now: i64) {
        record.created_by = self.user.clone();
        record.created_at = creation_date.unwrap_or(now);
        record.updated_at = now;
    }
}

impl RepositorySession for LocalRepositorySession {
    fn repository_info(&self) -> &RepositoryInfo {
        &self.info
    }

    fn type_definition(&self, type_id: &str) -> CmisResult<TypeDefinition> {
        let types = SqliteTypeRepository::new(&self.conn);
        let resolved = types
            .resolve_type_id(type_id)?
            .ok_or_else(|| CmisError::NotFound(format!("type `{type_id}`")))?;
        types
            .get_type(&resolved)?
            .ok_or_else(|| CmisError::NotFound(format!("type `{type_id}`")))
    }

    fn object(&self, id: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        let record = get_record(&self.conn, id)?;
        to_object(&self.conn, &record, ctx)
    }

    fn object_by_path(&self, path: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        if !path.starts_with('/') {
            return Err(CmisError::InvalidArgument(format!(
                "path `{path}` must be absolute"
            )));
        }
        let normalized = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        let objects = SqliteObjectRepository::new(&self.conn);
        if let Some(folder) = objects.get_folder_by_path(normalized)? {
            return to_object(&self.conn, &folder, ctx);
        }

        let (parent_path, name) = split_path(normalized);
        let parent = objects
            .get_folder_by_path(parent_path)?
            .ok_or_else(|| CmisError::NotFound(format!("path `{path}`")))?;
        let child = objects
            .get_child_by_name(&parent.object_id, name)?
            .ok_or_else(|| CmisError::NotFound(format!("path `{path}`")))?;
        to_object(&self.conn, &child, ctx)
    }

    fn children(
        &self,
        folder_id: &str,
        ctx: &OperationContext,
    ) -> CmisResult<Vec<RepositoryObject>> {
        let objects = SqliteObjectRepository::new(&self.conn);
        let folder = require_folder(&objects, folder_id)?;
        objects
            .list_children(&folder.object_id)?
            .iter()
            .map(|record| to_object(&self.conn, record, ctx))
            .collect()
    }

    fn query(
        &self,
        statement: &str,
        search_all_versions: bool,
        max_items: Option<u32>,
        _ctx: &OperationContext,
    ) -> CmisResult<Vec<QueryRow>> {
        let started_at = Instant::now();
        let parsed = parse_statement(statement)?;
        let rows = query::execute(&self.conn, &parsed, search_all_versions, max_items)?;
        debug!(
            "event=query module=session.local status=ok rows={} duration_ms={}",
            rows.len(),
            started_at.elapsed().as_millis()
        );
        Ok(rows)
    }

    fn create_folder(&self, parent_id: &str, properties: Properties) -> CmisResult<ObjectId> {
        self.write("create_folder", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let parent = require_folder(&objects, parent_id)?;
            let input = PropertyInput::split(tx, properties)?;
            let name = validate_name(input.name.as_deref())?;
            let definition = creatable_type(tx, input.type_id.as_deref(), BaseType::Folder)?;
            ensure_name_free(&objects, &parent.object_id, &name, None)?;

            let now = now_epoch_ms();
            let mut record = ObjectRecord::new(
                Uuid::new_v4().to_string(),
                BaseType::Folder,
                definition.id,
                name,
            );
            record.path = Some(child_path(parent.path.as_deref().unwrap_or("/"), &record.name));
            record.parent_id = Some(parent.object_id);
            self.stamp(&mut record, input.creation_date, now);

            objects.insert(&record, None)?;
            upsert_properties(tx, &record.object_id, &input.custom)?;
            Ok(record.object_id)
        })
    }

    fn create_document(
        &self,
        folder_id: &str,
        properties: Properties,
        content: Option<ContentStream>,
        versioning_state: VersioningState,
    ) -> CmisResult<ObjectId> {
        let content = content.map(StoredContent::read).transpose()?;
        self.write("create_document", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let folder = require_folder(&objects, folder_id)?;
            let input = PropertyInput::split(tx, properties)?;
            let name = validate_name(input.name.as_deref())?;
            let definition = creatable_type(tx, input.type_id.as_deref(), BaseType::Document)?;
            if versioning_state == VersioningState::CheckedOut && !definition.versionable {
                return Err(CmisError::Constraint(format!(
                    "type `{}` is not versionable",
                    definition.id
                )));
            }
            ensure_name_free(&objects, &folder.object_id, &name, None)?;

            let (label, is_major, is_pwc) = match versioning_state {
                VersioningState::None | VersioningState::Major => ("1.0", true, false),
                VersioningState::Minor => ("0.1", false, false),
                VersioningState::CheckedOut => (PWC_LABEL, false, true),
            };
            let series = Uuid::new_v4().to_string();
            let now = now_epoch_ms();
            let mut record = ObjectRecord::new(
                version_id(&series, label),
                BaseType::Document,
                definition.id,
                name,
            );
            record.parent_id = Some(folder.object_id);
            record.version_series_id = Some(series);
            record.version_label = Some(label.to_string());
            record.is_latest_version = !is_pwc;
            record.is_major_version = is_major;
            record.is_pwc = is_pwc;
            self.stamp(&mut record, input.creation_date, now);

            let bytes = match content {
                Some(stored) => {
                    stored.apply(&mut record);
                    Some(stored.bytes)
                }
                None => None,
            };
            objects.insert(&record, bytes.as_deref())?;
            upsert_properties(tx, &record.object_id, &input.custom)?;
            Ok(record.object_id)
        })
    }

    fn create_relationship(&self, properties: Properties) -> CmisResult<ObjectId> {
        self.write("create_relationship", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let input = PropertyInput::split(tx, properties)?;
            let source_id = required_endpoint(input.source_id.as_deref(), property_ids::SOURCE_ID)?;
            let target_id = required_endpoint(input.target_id.as_deref(), property_ids::TARGET_ID)?;
            get_record(tx, source_id)?;
            get_record(tx, target_id)?;
            let definition =
                creatable_type(tx, input.type_id.as_deref(), BaseType::Relationship)?;

            let now = now_epoch_ms();
            let mut record = ObjectRecord::new(
                Uuid::new_v4().to_string(),
                BaseType::Relationship,
                definition.id,
                input.name.clone().unwrap_or_default(),
            );
            record.source_id = Some(source_id.to_string());
            record.target_id = Some(target_id.to_string());
            self.stamp(&mut record, input.creation_date, now);

            objects.insert(&record, None)?;
            upsert_properties(tx, &record.object_id, &input.custom)?;
            Ok(record.object_id)
        })
    }

    fn update_properties(&self, id: &str, properties: Properties) -> CmisResult<ObjectId> {
        self.write("update_properties", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let record = get_record(tx, id)?;
            let input = PropertyInput::split(tx, properties)?;
            input.reject_immutable()?;
            if record.base_type == BaseType::Document
                && !record.is_pwc
                && !record.is_latest_version
            {
                return Err(CmisError::Constraint(format!(
                    "`{id}` is not the latest version"
                )));
            }

            let now = now_epoch_ms();
            if let Some(name) = input.name.as_deref() {
                if name != record.name {
                    rename_record(&objects, &record, validate_name(Some(name))?, now)?;
                }
            }
            upsert_properties(tx, &record.object_id, &input.custom)?;
            objects.touch(&record.object_id, now)?;
            Ok(record.object_id)
        })
    }

    fn check_out(&self, id: &str) -> CmisResult<ObjectId> {
        self.write("check_out", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let record = get_record(tx, id)?;
            let series = document_series(&record)?;
            if record.is_pwc || !record.is_latest_version {
                return Err(CmisError::Constraint(format!(
                    "only the latest version can be checked out, `{id}` is not"
                )));
            }
            if !is_versionable(tx, &record.type_id)? {
                return Err(CmisError::Constraint(format!(
                    "type `{}` is not versionable",
                    record.type_id
                )));
            }
            if objects.find_pwc(series)?.is_some() {
                return Err(CmisError::Constraint(format!(
                    "version series `{series}` is already checked out"
                )));
            }

            let content = objects.load_content(&record.object_id)?;
            let now = now_epoch_ms();
            let mut pwc = record.clone();
            pwc.object_id = version_id(series, PWC_LABEL);
            pwc.version_label = Some(PWC_LABEL.to_string());
            pwc.is_latest_version = false;
            pwc.is_major_version = false;
            pwc.is_pwc = true;
            pwc.checkin_comment = None;
            self.stamp(&mut pwc, None, now);

            objects.insert(&pwc, content.as_deref())?;
            copy_properties(tx, &record.object_id, &pwc.object_id)?;
            Ok(pwc.object_id)
        })
    }

    fn check_in(&self, pwc_id: &str, check_in: CheckIn) -> CmisResult<ObjectId> {
        let CheckIn {
            major,
            properties,
            content,
            comment,
        } = check_in;
        let content = content.map(StoredContent::read).transpose()?;

        self.write("check_in", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let pwc = get_record(tx, pwc_id)?;
            if !pwc.is_pwc {
                return Err(CmisError::Constraint(format!(
                    "`{pwc_id}` is not a private working copy"
                )));
            }
            let series = document_series(&pwc)?.to_string();
            let input = PropertyInput::split(tx, properties)?;
            input.reject_immutable()?;

            let previous = objects.list_versions(&series)?.into_iter().next();
            let label = next_version_label(
                previous.as_ref().and_then(|record| record.version_label.as_deref()),
                major,
            )?;

            let now = now_epoch_ms();
            let mut version = pwc.clone();
            version.object_id = version_id(&series, &label);
            version.version_label = Some(label);
            version.is_pwc = false;
            version.is_latest_version = true;
            version.is_major_version = major;
            version.checkin_comment = comment;
            self.stamp(&mut version, None, now);

            if let Some(name) = input.name.as_deref() {
                if name != version.name {
                    let name = validate_name(Some(name))?;
                    if let Some(parent_id) = version.parent_id.as_deref() {
                        ensure_name_free(&objects, parent_id, &name, Some(&series))?;
                    }
                    version.name = name;
                }
            }

            let bytes = match content {
                Some(stored) => {
                    stored.apply(&mut version);
                    Some(stored.bytes)
                }
                None => objects.load_content(&pwc.object_id)?,
            };

            if let Some(previous) = &previous {
                objects.set_latest(&previous.object_id, false)?;
            }
            objects.insert(&version, bytes.as_deref())?;
            copy_properties(tx, &pwc.object_id, &version.object_id)?;
            upsert_properties(tx, &version.object_id, &input.custom)?;
            objects.delete_many(&[pwc.object_id])?;
            Ok(version.object_id)
        })
    }

    fn delete_object(&self, id: &str, all_versions: bool) -> CmisResult<()> {
        self.write("delete_object", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let record = get_record(tx, id)?;
            match record.base_type {
                BaseType::Folder => {
                    if record.parent_id.is_none() {
                        return Err(CmisError::Constraint(
                            "the root folder cannot be deleted".to_string(),
                        ));
                    }
                    if objects.has_children(id)? {
                        return Err(CmisError::Constraint(format!(
                            "folder `{id}` is not empty"
                        )));
                    }
                    objects.delete_many(&[record.object_id])?;
                }
                BaseType::Document if record.is_pwc => {
                    objects.delete_many(&[record.object_id])?;
                }
                BaseType::Document => {
                    let series = document_series(&record)?;
                    let pwc = objects.find_pwc(series)?;
                    if all_versions {
                        let mut ids: Vec<String> = objects
                            .list_versions(series)?
                            .into_iter()
                            .map(|version| version.object_id)
                            .collect();
                        ids.extend(pwc.map(|pwc| pwc.object_id));
                        objects.delete_many(&ids)?;
                    } else {
                        if record.is_latest_version && pwc.is_some() {
                            return Err(CmisError::Constraint(format!(
                                "version series `{series}` is checked out"
                            )));
                        }
                        objects.delete_many(&[record.object_id.clone()])?;
                        if record.is_latest_version {
                            if let Some(newest) = objects.list_versions(series)?.first() {
                                objects.set_latest(&newest.object_id, true)?;
                            }
                        }
                    }
                }
                _ => {
                    objects.delete_many(&[record.object_id])?;
                }
            }
            Ok(())
        })
    }

    fn delete_tree(
        &self,
        folder_id: &str,
        all_versions: bool,
        unfile: UnfileObject,
        continue_on_failure: bool,
    ) -> CmisResult<Vec<ObjectId>> {
        self.write("delete_tree", |tx| {
            let objects = SqliteObjectRepository::new(tx);
            let folder = require_folder(&objects, folder_id)?;
            if folder.parent_id.is_none() {
                return Err(CmisError::Constraint(
                    "the root folder cannot be deleted".to_string(),
                ));
            }

            let subtree = objects.folder_subtree_ids(&folder.object_id)?;
            let mut ids = objects.filed_object_ids(&subtree)?;
            ids.extend(subtree);
            ids.sort();
            ids.dedup();
            let deleted = objects.delete_many(&ids)?;
            info!(
                "event=delete_tree module=session.local status=ok folder_id={} deleted={} all_versions={} unfile={} continue_on_failure={}",
                folder_id,
                deleted,
                all_versions,
                unfile.as_str(),
                continue_on_failure
            );
            Ok(Vec::new())
        })
    }

    fn content_stream(&self, id: &str) -> CmisResult<ContentStream> {
        let record = get_record(&self.conn, id)?;
        if record.base_type != BaseType::Document {
            return Err(CmisError::Constraint(format!(
                "`{id}` is not a document"
            )));
        }
        let bytes = SqliteObjectRepository::new(&self.conn)
            .load_content(id)?
            .ok_or_else(|| {
                CmisError::Constraint(format!("document `{id}` has no content stream"))
            })?;
        Ok(ContentStream::from_bytes(
            record.content_file_name,
            record
                .content_mime_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            bytes,
        ))
    }

    fn all_versions(&self, id: &str, ctx: &OperationContext) -> CmisResult<Vec<Document>> {
        let record = get_record(&self.conn, id)?;
        let series = document_series(&record)?;
        SqliteObjectRepository::new(&self.conn)
            .list_versions(series)?
            .iter()
            .map(|version| {
                to_object(&self.conn, version, ctx)?
                    .into_document()
                    .ok_or_else(|| {
                        CmisError::InvalidData(format!(
                            "version `{}` is not a document",
                            version.object_id
                        ))
                    })
            })
            .collect()
    }
}

/// Caller properties split into column-backed fields and the custom bag.
#[derive(Debug, Default)]
struct PropertyInput {
    name: Option<String>,
    type_id: Option<String>,
    creation_date: Option<i64>,
    source_id: Option<String>,
    target_id: Option<String>,
    custom: Properties,
}

impl PropertyInput {
    fn split(conn: &Connection, properties: Properties) -> CmisResult<Self> {
        let mut input = Self::default();
        for (id, value) in properties {
            match id.as_str() {
                property_ids::NAME => input.name = Some(string_property(&id, &value)?),
                property_ids::OBJECT_TYPE_ID => {
                    input.type_id = Some(string_property(&id, &value)?);
                }
                property_ids::CREATION_DATE => {
                    input.creation_date = Some(value.as_i64().ok_or_else(|| {
                        CmisError::InvalidArgument(format!("`{id}` must be a datetime"))
                    })?);
                }
                property_ids::SOURCE_ID => input.source_id = Some(string_property(&id, &value)?),
                property_ids::TARGET_ID => input.target_id = Some(string_property(&id, &value)?),
                property_ids::SECONDARY_OBJECT_TYPE_IDS => {
                    let normalized = secondary_type_ids(conn, &value)?;
                    input.custom.insert(id, normalized);
                }
                reserved if property_ids::READ_ONLY.contains(&reserved) => {
                    return Err(CmisError::Constraint(format!(
                        "property `{reserved}` is read-only"
                    )));
                }
                _ => {
                    input.custom.insert(id, value);
                }
            }
        }
        Ok(input)
    }

    /// Rejects properties fixed at creation time.
    fn reject_immutable(&self) -> CmisResult<()> {
        let fixed = [
            (self.type_id.is_some(), property_ids::OBJECT_TYPE_ID),
            (self.creation_date.is_some(), property_ids::CREATION_DATE),
            (self.source_id.is_some(), property_ids::SOURCE_ID),
            (self.target_id.is_some(), property_ids::TARGET_ID),
        ];
        match fixed.iter().find(|(present, _)| *present) {
            Some((_, id)) => Err(CmisError::Constraint(format!(
                "property `{id}` cannot change after creation"
            ))),
            None => Ok(()),
        }
    }
}

/// Content read into memory before the write transaction starts.
struct StoredContent {
    file_name: Option<String>,
    mime_type: String,
    bytes: Vec<u8>,
}

impl StoredContent {
    fn read(stream: ContentStream) -> CmisResult<Self> {
        let file_name = stream.file_name.clone();
        let mime_type = stream.mime_type.clone();
        let declared = stream.length;
        let bytes = stream.read_to_vec()?;
        if let Some(declared) = declared {
            if declared != bytes.len() as u64 {
                return Err(CmisError::InvalidArgument(format!(
                    "content stream declared {declared} bytes but yielded {}",
                    bytes.len()
                )));
            }
        }
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    fn apply(&self, record: &mut ObjectRecord) {
        record.content_length = Some(self.bytes.len() as i64);
        record.content_mime_type = Some(self.mime_type.clone());
        record.content_file_name = Some(
            self.file_name
                .clone()
                .unwrap_or_else(|| record.name.clone()),
        );
    }
}

fn bootstrap_repository(conn: &Connection) -> CmisResult<RepositoryInfo> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let repository_id = match read_meta(&tx, META_REPOSITORY_ID)? {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            write_meta(&tx, META_REPOSITORY_ID, &id)?;
            id
        }
    };

    let root_folder_id = match read_meta(&tx, META_ROOT_FOLDER_ID)? {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            let now = now_epoch_ms();
            let mut root = ObjectRecord::new(
                id.clone(),
                BaseType::Folder,
                BaseType::Folder.as_str().to_string(),
                ROOT_FOLDER_NAME.to_string(),
            );
            root.path = Some("/".to_string());
            root.created_by = SYSTEM_USER.to_string();
            root.created_at = now;
            root.updated_at = now;
            SqliteObjectRepository::new(&tx).insert(&root, None)?;
            write_meta(&tx, META_ROOT_FOLDER_ID, &id)?;
            info!(
                "event=repository_bootstrap module=session.local status=ok repository_id={} root_folder_id={}",
                repository_id, id
            );
            id
        }
    };

    tx.commit()?;
    Ok(RepositoryInfo {
        id: repository_id,
        name: "Local Repository".to_string(),
        description: "Embedded SQLite repository".to_string(),
        product_name: "alfresco_core".to_string(),
        product_version: env!("CARGO_PKG_VERSION").to_string(),
        root_folder_id,
        cmis_version: "1.1".to_string(),
    })
}

fn read_meta(conn: &Connection, key: &str) -> CmisResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM repository_meta WHERE key = ?1;",
            [key],
            |row| row.get(0),
        )
        .optional()?)
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> CmisResult<()> {
    conn.execute(
        "INSERT INTO repository_meta (key, value) VALUES (?1, ?2);",
        params![key, value],
    )?;
    Ok(())
}

fn get_record(conn: &Connection, id: &str) -> CmisResult<ObjectRecord> {
    SqliteObjectRepository::new(conn)
        .get(id)?
        .ok_or_else(|| CmisError::NotFound(format!("object `{id}`")))
}

fn require_folder(objects: &SqliteObjectRepository<'_>, id: &str) -> CmisResult<ObjectRecord> {
    let record = objects
        .get(id)?
        .ok_or_else(|| CmisError::NotFound(format!("folder `{id}`")))?;
    if record.base_type != BaseType::Folder {
        return Err(CmisError::InvalidArgument(format!("`{id}` is not a folder")));
    }
    Ok(record)
}

fn document_series(record: &ObjectRecord) -> CmisResult<&str> {
    if record.base_type != BaseType::Document {
        return Err(CmisError::InvalidArgument(format!(
            "`{}` is not a document",
            record.object_id
        )));
    }
    record.version_series_id.as_deref().ok_or_else(|| {
        CmisError::InvalidData(format!(
            "document `{}` has no version series",
            record.object_id
        ))
    })
}

/// Full property bag: stored custom properties overlaid with column values.
pub(super) fn object_properties(conn: &Connection, record: &ObjectRecord) -> CmisResult<Properties> {
    let series_checked_out = match (&record.base_type, &record.version_series_id) {
        (BaseType::Document, Some(series)) => {
            record.is_pwc || SqliteObjectRepository::new(conn).find_pwc(series)?.is_some()
        }
        _ => false,
    };
    let mut properties = load_properties(conn, &record.object_id)?;
    properties.extend(record.reserved_properties(series_checked_out));
    Ok(properties)
}

fn to_object(
    conn: &Connection,
    record: &ObjectRecord,
    ctx: &OperationContext,
) -> CmisResult<RepositoryObject> {
    let properties = object_properties(conn, record)?;
    let actions = if ctx.include_allowable_actions {
        let checked_out = properties
            .get(property_ids::IS_VERSION_SERIES_CHECKED_OUT)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false);
        allowable_actions(conn, record, checked_out)?
    } else {
        BTreeSet::new()
    };

    let end = match ctx.include_relationships {
        IncludeRelationships::None => None,
        IncludeRelationships::Source => Some(RelationshipEnd::Source),
        IncludeRelationships::Target => Some(RelationshipEnd::Target),
        IncludeRelationships::Both => Some(RelationshipEnd::Either),
    };
    let relationships = match end {
        Some(end) if record.base_type == BaseType::Document => SqliteObjectRepository::new(conn)
            .relationships(&record.object_id, end)?
            .iter()
            .map(|relationship| to_relationship(conn, relationship))
            .collect::<CmisResult<Vec<_>>>()?,
        _ => Vec::new(),
    };

    RepositoryObject::from_parts(properties, actions, relationships)
}

fn to_relationship(conn: &Connection, record: &ObjectRecord) -> CmisResult<Relationship> {
    let properties = object_properties(conn, record)?;
    match RepositoryObject::from_parts(properties, BTreeSet::new(), Vec::new())? {
        RepositoryObject::Relationship(relationship) => Ok(relationship),
        other => Err(CmisError::InvalidData(format!(
            "`{}` is not a relationship",
            other.id()
        ))),
    }
}

fn allowable_actions(
    conn: &Connection,
    record: &ObjectRecord,
    series_checked_out: bool,
) -> CmisResult<BTreeSet<AllowableAction>> {
    use AllowableAction::*;

    let mut actions = BTreeSet::new();
    match record.base_type {
        BaseType::Folder => {
            actions.extend([
                CanGetChildren,
                CanCreateDocument,
                CanCreateFolder,
                CanUpdateProperties,
            ]);
            if record.parent_id.is_some() {
                actions.extend([CanDeleteObject, CanDeleteTree]);
            }
        }
        BaseType::Document => {
            actions.extend([CanGetAllVersions, CanCreateRelationship, CanDeleteObject]);
            if record.content_length.is_some() {
                actions.insert(CanGetContentStream);
            }
            if record.is_pwc {
                actions.extend([CanCheckIn, CanCancelCheckOut, CanUpdateProperties]);
            } else if record.is_latest_version && !series_checked_out {
                actions.insert(CanUpdateProperties);
                if is_versionable(conn, &record.type_id)? {
                    actions.insert(CanCheckOut);
                }
            }
        }
        BaseType::Relationship => {
            actions.extend([CanDeleteObject, CanUpdateProperties]);
        }
        BaseType::Secondary | BaseType::Policy | BaseType::Item => {}
    }
    Ok(actions)
}

fn is_versionable(conn: &Connection, type_id: &str) -> CmisResult<bool> {
    Ok(SqliteTypeRepository::new(conn)
        .get_type(type_id)?
        .is_some_and(|definition| definition.versionable))
}

fn creatable_type(
    conn: &Connection,
    requested: Option<&str>,
    base_type: BaseType,
) -> CmisResult<TypeDefinition> {
    let name = requested.unwrap_or(base_type.as_str());
    let types = SqliteTypeRepository::new(conn);
    let definition = types
        .resolve_type_id(name)?
        .map(|type_id| types.get_type(&type_id))
        .transpose()?
        .flatten()
        .ok_or_else(|| CmisError::InvalidArgument(format!("unknown object type `{name}`")))?;

    if definition.base_type != base_type {
        return Err(CmisError::InvalidArgument(format!(
            "type `{}` is not a {} type",
            definition.id,
            base_type.as_str()
        )));
    }
    if !definition.creatable {
        return Err(CmisError::Constraint(format!(
            "type `{}` is not creatable",
            definition.id
        )));
    }
    Ok(definition)
}

/// Normalizes `cmis:secondaryObjectTypeIds` to registered secondary type ids.
fn secondary_type_ids(conn: &Connection, value: &PropertyValue) -> CmisResult<PropertyValue> {
    let types = SqliteTypeRepository::new(conn);
    let mut ids = Vec::new();
    for name in value.string_values() {
        let definition = types
            .resolve_type_id(&name)?
            .map(|type_id| types.get_type(&type_id))
            .transpose()?
            .flatten()
            .ok_or_else(|| CmisError::InvalidArgument(format!("unknown secondary type `{name}`")))?;
        if definition.base_type != BaseType::Secondary {
            return Err(CmisError::InvalidArgument(format!(
                "`{name}` is not a secondary type"
            )));
        }
        if !ids.contains(&definition.id) {
            ids.push(definition.id);
        }
    }
    Ok(PropertyValue::from(ids))
}

fn string_property(id: &str, value: &PropertyValue) -> CmisResult<String> {
    value
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| CmisError::InvalidArgument(format!("`{id}` must be a string")))
}

fn required_endpoint<'a>(value: Option<&'a str>, id: &str) -> CmisResult<&'a str> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CmisError::InvalidArgument(format!("`{id}` is required")))
}

fn validate_name(name: Option<&str>) -> CmisResult<String> {
    let name = name.ok_or_else(|| {
        CmisError::InvalidArgument(format!("`{}` is required", property_ids::NAME))
    })?;
    if name.trim().is_empty() || name.contains('/') {
        return Err(CmisError::InvalidArgument(format!(
            "invalid object name `{name}`"
        )));
    }
    Ok(name.to_string())
}

fn ensure_name_free(
    objects: &SqliteObjectRepository<'_>,
    parent_id: &str,
    name: &str,
    exclude_series: Option<&str>,
) -> CmisResult<()> {
    if objects.name_taken(parent_id, name, exclude_series)? {
        return Err(CmisError::AlreadyExists(format!(
            "`{name}` already exists in folder `{parent_id}`"
        )));
    }
    Ok(())
}

fn rename_record(
    objects: &SqliteObjectRepository<'_>,
    record: &ObjectRecord,
    name: String,
    now: i64,
) -> CmisResult<()> {
    let Some(parent_id) = record.parent_id.as_deref() else {
        if record.base_type == BaseType::Folder {
            return Err(CmisError::Constraint(
                "the root folder cannot be renamed".to_string(),
            ));
        }
        return objects.rename(&record.object_id, &name, now);
    };

    ensure_name_free(objects, parent_id, &name, record.version_series_id.as_deref())?;
    objects.rename(&record.object_id, &name, now)?;
    if let Some(old_path) = record.path.as_deref() {
        let (parent_path, _) = split_path(old_path);
        objects.move_folder_paths(old_path, &child_path(parent_path, &name))?;
    }
    Ok(())
}

fn version_id(series: &str, label: &str) -> String {
    format!("{series};{label}")
}

/// `1.3` + major -> `2.0`; `1.3` + minor -> `1.4`; no previous version
/// starts at `1.0` / `0.1`.
fn next_version_label(previous: Option<&str>, major: bool) -> CmisResult<String> {
    let (major_part, minor_part) = match previous {
        Some(label) => parse_version_label(label)?,
        None => (0, 0),
    };
    if major {
        return Ok(format!("{}.0", major_part + 1));
    }
    Ok(format!("{major_part}.{}", minor_part + 1))
}

fn parse_version_label(label: &str) -> CmisResult<(u32, u32)> {
    let invalid = || CmisError::InvalidData(format!("invalid version label `{label}`"));
    let (major, minor) = label.split_once('.').ok_or_else(invalid)?;
    Ok((
        major.parse().map_err(|_| invalid())?,
        minor.parse().map_err(|_| invalid())?,
    ))
}

fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path.ends_with('/') {
        format!("{parent_path}{name}")
    } else {
        format!("{parent_path}/{name}")
    }
}

/// `/a/b` -> (`/a`, `b`); `/a` -> (`/`, `a`).
fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => ("/", path),
    }
}
