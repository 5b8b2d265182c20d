//! Type registry contracts and SQLite implementation.
//!
//! # Responsibility
//! - Store type definitions with their parent chain.
//! - Resolve query names and subtype sets for the query engine.
//!
//! # Invariants
//! - A subtype shares its parent's base type.
//! - Property definitions are inherited from every ancestor.

use crate::error::{CmisError, CmisResult};
use crate::model::{BaseType, TypeDefinition};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for the type registry.
pub trait TypeRepository {
    /// Loads one type with inherited property definitions.
    fn get_type(&self, type_id: &str) -> CmisResult<Option<TypeDefinition>>;
    /// Registers a new type.
    fn insert_type(&self, definition: &TypeDefinition) -> CmisResult<()>;
    /// Resolves a type id from its id or query name.
    fn resolve_type_id(&self, name: &str) -> CmisResult<Option<String>>;
    /// The type itself plus every descendant type id.
    fn subtype_ids(&self, type_id: &str) -> CmisResult<Vec<String>>;
}

/// SQLite-backed type registry.
pub struct SqliteTypeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTypeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TypeRepository for SqliteTypeRepository<'_> {
    fn get_type(&self, type_id: &str) -> CmisResult<Option<TypeDefinition>> {
        let mut stmt = self.conn.prepare(
            "SELECT type_id, query_name, display_name, base_type, parent_type_id, creatable, versionable
             FROM object_types
             WHERE type_id = ?1;",
        )?;
        let mut rows = stmt.query([type_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut definition = parse_type_row(row)?;
        definition.property_definitions = load_inherited_properties(self.conn, type_id)?;
        Ok(Some(definition))
    }

    fn insert_type(&self, definition: &TypeDefinition) -> CmisResult<()> {
        if self.get_type(&definition.id)?.is_some() {
            return Err(CmisError::AlreadyExists(format!(
                "type `{}` is already registered",
                definition.id
            )));
        }
        let parent_id = definition.parent_type_id.as_deref().ok_or_else(|| {
            CmisError::InvalidArgument(format!("type `{}` needs a parent type", definition.id))
        })?;
        let parent = self.get_type(parent_id)?.ok_or_else(|| {
            CmisError::InvalidArgument(format!("unknown parent type `{parent_id}`"))
        })?;
        if parent.base_type != definition.base_type {
            return Err(CmisError::InvalidArgument(format!(
                "type `{}` must share base type `{}` with its parent",
                definition.id,
                parent.base_type.as_str()
            )));
        }

        self.conn.execute(
            "INSERT INTO object_types (
                type_id,
                query_name,
                display_name,
                base_type,
                parent_type_id,
                creatable,
                versionable
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                definition.id,
                definition.query_name,
                definition.display_name,
                definition.base_type.as_str(),
                parent_id,
                super::bool_to_int(definition.creatable),
                super::bool_to_int(definition.versionable),
            ],
        )?;

        for (property_id, query_name) in &definition.property_definitions {
            self.conn.execute(
                "INSERT OR REPLACE INTO type_properties (type_id, property_id, query_name)
                 VALUES (?1, ?2, ?3);",
                params![definition.id, property_id, query_name],
            )?;
        }
        Ok(())
    }

    fn resolve_type_id(&self, name: &str) -> CmisResult<Option<String>> {
        let type_id = self
            .conn
            .query_row(
                "SELECT type_id
                 FROM object_types
                 WHERE type_id = ?1 OR query_name = ?1
                 ORDER BY CASE WHEN type_id = ?1 THEN 0 ELSE 1 END
                 LIMIT 1;",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(type_id)
    }

    fn subtype_ids(&self, type_id: &str) -> CmisResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE descendants(type_id) AS (
                SELECT type_id
                FROM object_types
                WHERE type_id = ?1
                UNION ALL
                SELECT child.type_id
                FROM object_types child
                INNER JOIN descendants parent ON child.parent_type_id = parent.type_id
            )
            SELECT type_id FROM descendants;",
        )?;
        let mut rows = stmt.query([type_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}

fn load_inherited_properties(conn: &Connection, type_id: &str) -> CmisResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE ancestors(type_id, parent_type_id, depth) AS (
            SELECT type_id, parent_type_id, 0
            FROM object_types
            WHERE type_id = ?1
            UNION ALL
            SELECT t.type_id, t.parent_type_id, a.depth + 1
            FROM object_types t
            INNER JOIN ancestors a ON t.type_id = a.parent_type_id
        )
        SELECT p.property_id, p.query_name
        FROM type_properties p
        INNER JOIN ancestors a ON a.type_id = p.type_id
        ORDER BY a.depth DESC, p.rowid ASC;",
    )?;
    let mut rows = stmt.query([type_id])?;
    let mut definitions: Vec<(String, String)> = Vec::new();
    while let Some(row) = rows.next()? {
        let property_id: String = row.get(0)?;
        let query_name: String = row.get(1)?;
        match definitions.iter_mut().find(|(id, _)| *id == property_id) {
            Some(existing) => existing.1 = query_name,
            None => definitions.push((property_id, query_name)),
        }
    }
    Ok(definitions)
}

fn parse_type_row(row: &Row<'_>) -> CmisResult<TypeDefinition> {
    let base_text: String = row.get("base_type")?;
    let base_type = BaseType::parse(&base_text).ok_or_else(|| {
        CmisError::InvalidData(format!(
            "invalid base type `{base_text}` in object_types.base_type"
        ))
    })?;

    Ok(TypeDefinition {
        id: row.get("type_id")?,
        query_name: row.get("query_name")?,
        display_name: row.get("display_name")?,
        base_type,
        parent_type_id: row.get("parent_type_id")?,
        creatable: super::parse_flag(row.get("creatable")?, "object_types.creatable")?,
        versionable: super::parse_flag(row.get("versionable")?, "object_types.versionable")?,
        property_definitions: Vec::new(),
    })
}
