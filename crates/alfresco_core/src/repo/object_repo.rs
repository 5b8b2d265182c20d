//! Object row contracts and SQLite implementation.
//!
//! # Responsibility
//! - Store folders, document versions, working copies and relationships.
//! - Provide the lookups the local session needs (by id, path, parent, series).
//!
//! # Invariants
//! - Listing order is insertion order (`seq ASC`) unless stated otherwise.
//! - Version series listings are newest first (`seq DESC`).
//! - Content bytes are only loaded through [`ObjectRepository::load_content`].

use super::{bool_to_int, parse_flag};
use crate::error::{CmisError, CmisResult};
use crate::model::{property_ids, BaseType, Properties, PropertyValue};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const OBJECT_SELECT_SQL: &str = "SELECT
    seq,
    object_id,
    base_type,
    type_id,
    name,
    parent_id,
    path,
    version_series_id,
    version_label,
    is_latest_version,
    is_major_version,
    is_pwc,
    checkin_comment,
    content_length,
    content_mime_type,
    content_file_name,
    source_id,
    target_id,
    created_by,
    created_at,
    updated_at
FROM objects";

/// One stored object row, without content bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub seq: i64,
    pub object_id: String,
    pub base_type: BaseType,
    pub type_id: String,
    pub name: String,
    /// Filing folder for folders and documents.
    pub parent_id: Option<String>,
    /// Set for folders only.
    pub path: Option<String>,
    pub version_series_id: Option<String>,
    pub version_label: Option<String>,
    pub is_latest_version: bool,
    pub is_major_version: bool,
    pub is_pwc: bool,
    pub checkin_comment: Option<String>,
    pub content_length: Option<i64>,
    pub content_mime_type: Option<String>,
    pub content_file_name: Option<String>,
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    pub created_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ObjectRecord {
    /// Blank row of the given base type; callers fill in the rest.
    pub fn new(object_id: String, base_type: BaseType, type_id: String, name: String) -> Self {
        Self {
            seq: 0,
            object_id,
            base_type,
            type_id,
            name,
            parent_id: None,
            path: None,
            version_series_id: None,
            version_label: None,
            is_latest_version: false,
            is_major_version: false,
            is_pwc: false,
            checkin_comment: None,
            content_length: None,
            content_mime_type: None,
            content_file_name: None,
            source_id: None,
            target_id: None,
            created_by: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Repository-maintained properties derived from the row.
    ///
    /// `series_checked_out` only matters for documents.
    pub fn reserved_properties(&self, series_checked_out: bool) -> Properties {
        let mut properties = Properties::new();
        let mut put = |id: &str, value: PropertyValue| {
            properties.insert(id.to_string(), value);
        };

        put(property_ids::OBJECT_ID, self.object_id.clone().into());
        put(property_ids::BASE_TYPE_ID, self.base_type.as_str().into());
        put(property_ids::OBJECT_TYPE_ID, self.type_id.clone().into());
        put(property_ids::NAME, self.name.clone().into());
        put(property_ids::CREATED_BY, self.created_by.clone().into());
        put(
            property_ids::CREATION_DATE,
            PropertyValue::DateTime(self.created_at),
        );
        put(
            property_ids::LAST_MODIFICATION_DATE,
            PropertyValue::DateTime(self.updated_at),
        );

        match self.base_type {
            BaseType::Folder => {
                if let Some(path) = &self.path {
                    put(property_ids::PATH, path.clone().into());
                }
                if let Some(parent_id) = &self.parent_id {
                    put(property_ids::PARENT_ID, parent_id.clone().into());
                }
            }
            BaseType::Document => {
                if let Some(series) = &self.version_series_id {
                    put(property_ids::VERSION_SERIES_ID, series.clone().into());
                }
                if let Some(label) = &self.version_label {
                    put(property_ids::VERSION_LABEL, label.clone().into());
                }
                put(
                    property_ids::IS_LATEST_VERSION,
                    self.is_latest_version.into(),
                );
                put(property_ids::IS_MAJOR_VERSION, self.is_major_version.into());
                put(property_ids::IS_PRIVATE_WORKING_COPY, self.is_pwc.into());
                put(
                    property_ids::IS_VERSION_SERIES_CHECKED_OUT,
                    series_checked_out.into(),
                );
                if let Some(comment) = &self.checkin_comment {
                    put(property_ids::CHECKIN_COMMENT, comment.clone().into());
                }
                if let Some(length) = self.content_length {
                    put(
                        property_ids::CONTENT_STREAM_LENGTH,
                        PropertyValue::Integer(length),
                    );
                }
                if let Some(mime_type) = &self.content_mime_type {
                    put(
                        property_ids::CONTENT_STREAM_MIME_TYPE,
                        mime_type.clone().into(),
                    );
                }
                if let Some(file_name) = &self.content_file_name {
                    put(
                        property_ids::CONTENT_STREAM_FILE_NAME,
                        file_name.clone().into(),
                    );
                }
            }
            BaseType::Relationship => {
                if let Some(source_id) = &self.source_id {
                    put(property_ids::SOURCE_ID, source_id.clone().into());
                }
                if let Some(target_id) = &self.target_id {
                    put(property_ids::TARGET_ID, target_id.clone().into());
                }
            }
            BaseType::Secondary | BaseType::Policy | BaseType::Item => {}
        }
        properties
    }
}

/// Which relationship endpoint to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipEnd {
    Source,
    Target,
    Either,
}

/// Repository interface for object rows.
pub trait ObjectRepository {
    fn get(&self, object_id: &str) -> CmisResult<Option<ObjectRecord>>;
    fn get_folder_by_path(&self, path: &str) -> CmisResult<Option<ObjectRecord>>;
    /// Visible child (folder, or latest non-PWC document) with this name.
    fn get_child_by_name(&self, parent_id: &str, name: &str) -> CmisResult<Option<ObjectRecord>>;
    /// Visible children in insertion order.
    fn list_children(&self, parent_id: &str) -> CmisResult<Vec<ObjectRecord>>;
    fn has_children(&self, folder_id: &str) -> CmisResult<bool>;
    /// Whether a visible sibling outside `exclude_series` uses `name`.
    fn name_taken(
        &self,
        parent_id: &str,
        name: &str,
        exclude_series: Option<&str>,
    ) -> CmisResult<bool>;
    fn insert(&self, record: &ObjectRecord, content: Option<&[u8]>) -> CmisResult<i64>;
    fn rename(&self, object_id: &str, name: &str, updated_at: i64) -> CmisResult<()>;
    /// Rewrites the path of a folder and every descendant folder.
    fn move_folder_paths(&self, old_path: &str, new_path: &str) -> CmisResult<()>;
    fn set_latest(&self, object_id: &str, is_latest: bool) -> CmisResult<()>;
    fn touch(&self, object_id: &str, updated_at: i64) -> CmisResult<()>;
    /// Non-PWC versions of a series, newest first.
    fn list_versions(&self, series_id: &str) -> CmisResult<Vec<ObjectRecord>>;
    fn find_pwc(&self, series_id: &str) -> CmisResult<Option<ObjectRecord>>;
    fn load_content(&self, object_id: &str) -> CmisResult<Option<Vec<u8>>>;
    /// The folder plus every descendant folder id.
    fn folder_subtree_ids(&self, folder_id: &str) -> CmisResult<Vec<String>>;
    /// Ids of every object filed in one of `folder_ids`.
    fn filed_object_ids(&self, folder_ids: &[String]) -> CmisResult<Vec<String>>;
    fn relationships(&self, object_id: &str, end: RelationshipEnd)
        -> CmisResult<Vec<ObjectRecord>>;
    /// Deletes the given rows plus relationships touching them.
    fn delete_many(&self, object_ids: &[String]) -> CmisResult<usize>;
    /// Query candidates of the given types.
    fn list_by_types(
        &self,
        type_ids: &[String],
        all_versions: bool,
    ) -> CmisResult<Vec<ObjectRecord>>;
}

/// SQLite-backed object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_records(&self, sql: &str, bind_values: Vec<Value>) -> CmisResult<Vec<ObjectRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_object_row(row)?);
        }
        Ok(records)
    }

    fn query_one(&self, sql: &str, bind_values: Vec<Value>) -> CmisResult<Option<ObjectRecord>> {
        Ok(self.query_records(sql, bind_values)?.into_iter().next())
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn get(&self, object_id: &str) -> CmisResult<Option<ObjectRecord>> {
        self.query_one(
            &format!("{OBJECT_SELECT_SQL} WHERE object_id = ?1;"),
            vec![text(object_id)],
        )
    }

    fn get_folder_by_path(&self, path: &str) -> CmisResult<Option<ObjectRecord>> {
        self.query_one(
            &format!("{OBJECT_SELECT_SQL} WHERE path = ?1 AND base_type = 'cmis:folder';"),
            vec![text(path)],
        )
    }

    fn get_child_by_name(&self, parent_id: &str, name: &str) -> CmisResult<Option<ObjectRecord>> {
        self.query_one(
            &format!(
                "{OBJECT_SELECT_SQL}
                 WHERE parent_id = ?1
                   AND name = ?2
                   AND is_pwc = 0
                   AND (base_type <> 'cmis:document' OR is_latest_version = 1)
                 ORDER BY seq ASC
                 LIMIT 1;"
            ),
            vec![text(parent_id), text(name)],
        )
    }

    fn list_children(&self, parent_id: &str) -> CmisResult<Vec<ObjectRecord>> {
        self.query_records(
            &format!(
                "{OBJECT_SELECT_SQL}
                 WHERE parent_id = ?1
                   AND is_pwc = 0
                   AND (base_type <> 'cmis:document' OR is_latest_version = 1)
                 ORDER BY seq ASC;"
            ),
            vec![text(parent_id)],
        )
    }

    fn has_children(&self, folder_id: &str) -> CmisResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM objects WHERE parent_id = ?1);",
            [folder_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn name_taken(
        &self,
        parent_id: &str,
        name: &str,
        exclude_series: Option<&str>,
    ) -> CmisResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM objects
                WHERE parent_id = ?1
                  AND name = ?2
                  AND is_pwc = 0
                  AND (base_type <> 'cmis:document' OR is_latest_version = 1)
                  AND (?3 IS NULL OR version_series_id IS NULL OR version_series_id <> ?3)
            );",
            params![parent_id, name, exclude_series],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert(&self, record: &ObjectRecord, content: Option<&[u8]>) -> CmisResult<i64> {
        self.conn.execute(
            "INSERT INTO objects (
                object_id,
                base_type,
                type_id,
                name,
                parent_id,
                path,
                version_series_id,
                version_label,
                is_latest_version,
                is_major_version,
                is_pwc,
                checkin_comment,
                content,
                content_length,
                content_mime_type,
                content_file_name,
                source_id,
                target_id,
                created_by,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21);",
            params![
                record.object_id,
                record.base_type.as_str(),
                record.type_id,
                record.name,
                record.parent_id,
                record.path,
                record.version_series_id,
                record.version_label,
                bool_to_int(record.is_latest_version),
                bool_to_int(record.is_major_version),
                bool_to_int(record.is_pwc),
                record.checkin_comment,
                content,
                record.content_length,
                record.content_mime_type,
                record.content_file_name,
                record.source_id,
                record.target_id,
                record.created_by,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn rename(&self, object_id: &str, name: &str, updated_at: i64) -> CmisResult<()> {
        let changed = self.conn.execute(
            "UPDATE objects SET name = ?2, updated_at = ?3 WHERE object_id = ?1;",
            params![object_id, name, updated_at],
        )?;
        if changed == 0 {
            return Err(CmisError::NotFound(format!("object `{object_id}`")));
        }
        Ok(())
    }

    fn move_folder_paths(&self, old_path: &str, new_path: &str) -> CmisResult<()> {
        let prefix = format!("{old_path}/");
        self.conn.execute(
            "UPDATE objects
             SET path = ?2 || substr(path, length(?1) + 1)
             WHERE base_type = 'cmis:folder'
               AND (path = ?1 OR substr(path, 1, length(?3)) = ?3);",
            params![old_path, new_path, prefix],
        )?;
        Ok(())
    }

    fn set_latest(&self, object_id: &str, is_latest: bool) -> CmisResult<()> {
        self.conn.execute(
            "UPDATE objects SET is_latest_version = ?2 WHERE object_id = ?1;",
            params![object_id, bool_to_int(is_latest)],
        )?;
        Ok(())
    }

    fn touch(&self, object_id: &str, updated_at: i64) -> CmisResult<()> {
        self.conn.execute(
            "UPDATE objects SET updated_at = ?2 WHERE object_id = ?1;",
            params![object_id, updated_at],
        )?;
        Ok(())
    }

    fn list_versions(&self, series_id: &str) -> CmisResult<Vec<ObjectRecord>> {
        self.query_records(
            &format!(
                "{OBJECT_SELECT_SQL}
                 WHERE version_series_id = ?1
                   AND is_pwc = 0
                 ORDER BY seq DESC;"
            ),
            vec![text(series_id)],
        )
    }

    fn find_pwc(&self, series_id: &str) -> CmisResult<Option<ObjectRecord>> {
        self.query_one(
            &format!("{OBJECT_SELECT_SQL} WHERE version_series_id = ?1 AND is_pwc = 1;"),
            vec![text(series_id)],
        )
    }

    fn load_content(&self, object_id: &str) -> CmisResult<Option<Vec<u8>>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM objects WHERE object_id = ?1;",
                [object_id],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()?;
        match content {
            Some(content) => Ok(content),
            None => Err(CmisError::NotFound(format!("object `{object_id}`"))),
        }
    }

    fn folder_subtree_ids(&self, folder_id: &str) -> CmisResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE subtree(object_id) AS (
                SELECT object_id
                FROM objects
                WHERE object_id = ?1
                  AND base_type = 'cmis:folder'
                UNION ALL
                SELECT child.object_id
                FROM objects child
                INNER JOIN subtree parent ON child.parent_id = parent.object_id
                WHERE child.base_type = 'cmis:folder'
            )
            SELECT object_id FROM subtree;",
        )?;
        let mut rows = stmt.query([folder_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn filed_object_ids(&self, folder_ids: &[String]) -> CmisResult<Vec<String>> {
        if folder_ids.is_empty() {
            return Ok(Vec::new());
        }
        stage_ids(self.conn, folder_ids)?;
        let mut stmt = self.conn.prepare(
            "SELECT object_id
             FROM objects
             WHERE parent_id IN (SELECT object_id FROM temp.staged_ids)
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn relationships(
        &self,
        object_id: &str,
        end: RelationshipEnd,
    ) -> CmisResult<Vec<ObjectRecord>> {
        let condition = match end {
            RelationshipEnd::Source => "source_id = ?1",
            RelationshipEnd::Target => "target_id = ?1",
            RelationshipEnd::Either => "(source_id = ?1 OR target_id = ?1)",
        };
        self.query_records(
            &format!(
                "{OBJECT_SELECT_SQL}
                 WHERE base_type = 'cmis:relationship'
                   AND {condition}
                 ORDER BY seq ASC;"
            ),
            vec![text(object_id)],
        )
    }

    fn delete_many(&self, object_ids: &[String]) -> CmisResult<usize> {
        if object_ids.is_empty() {
            return Ok(0);
        }
        stage_ids(self.conn, object_ids)?;
        self.conn.execute(
            "DELETE FROM objects
             WHERE base_type = 'cmis:relationship'
               AND (source_id IN (SELECT object_id FROM temp.staged_ids)
                    OR target_id IN (SELECT object_id FROM temp.staged_ids));",
            [],
        )?;
        let deleted = self.conn.execute(
            "DELETE FROM objects WHERE object_id IN (SELECT object_id FROM temp.staged_ids);",
            [],
        )?;
        Ok(deleted)
    }

    fn list_by_types(
        &self,
        type_ids: &[String],
        all_versions: bool,
    ) -> CmisResult<Vec<ObjectRecord>> {
        if type_ids.is_empty() {
            return Ok(Vec::new());
        }
        let version_filter = if all_versions {
            ""
        } else {
            " AND (base_type <> 'cmis:document' OR is_latest_version = 1)"
        };
        let sql = format!(
            "{OBJECT_SELECT_SQL}
             WHERE type_id IN ({})
               AND is_pwc = 0{version_filter}
             ORDER BY seq ASC;",
            placeholders(type_ids.len())
        );
        self.query_records(&sql, type_ids.iter().map(|id| text(id)).collect())
    }
}

fn parse_object_row(row: &Row<'_>) -> CmisResult<ObjectRecord> {
    let base_text: String = row.get("base_type")?;
    let base_type = BaseType::parse(&base_text).ok_or_else(|| {
        CmisError::InvalidData(format!("invalid base type `{base_text}` in objects.base_type"))
    })?;

    Ok(ObjectRecord {
        seq: row.get("seq")?,
        object_id: row.get("object_id")?,
        base_type,
        type_id: row.get("type_id")?,
        name: row.get("name")?,
        parent_id: row.get("parent_id")?,
        path: row.get("path")?,
        version_series_id: row.get("version_series_id")?,
        version_label: row.get("version_label")?,
        is_latest_version: parse_flag(row.get("is_latest_version")?, "objects.is_latest_version")?,
        is_major_version: parse_flag(row.get("is_major_version")?, "objects.is_major_version")?,
        is_pwc: parse_flag(row.get("is_pwc")?, "objects.is_pwc")?,
        checkin_comment: row.get("checkin_comment")?,
        content_length: row.get("content_length")?,
        content_mime_type: row.get("content_mime_type")?,
        content_file_name: row.get("content_file_name")?,
        source_id: row.get("source_id")?,
        target_id: row.get("target_id")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// Loads `ids` into the connection's `staged_ids` temp table, replacing its
/// previous contents. Set statements join against it instead of binding one
/// parameter per id, so subtree size is not capped by SQLite's bind limit.
fn stage_ids(conn: &Connection, ids: &[String]) -> CmisResult<()> {
    conn.execute_batch(
        "CREATE TEMP TABLE IF NOT EXISTS staged_ids (object_id TEXT PRIMARY KEY NOT NULL);
         DELETE FROM temp.staged_ids;",
    )?;
    let mut stmt =
        conn.prepare_cached("INSERT OR IGNORE INTO temp.staged_ids (object_id) VALUES (?1);")?;
    for id in ids {
        stmt.execute([id])?;
    }
    Ok(())
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
