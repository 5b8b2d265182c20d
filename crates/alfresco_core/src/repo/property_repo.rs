//! Custom property storage.
//!
//! # Responsibility
//! - Persist caller-supplied properties as JSON-encoded `PropertyValue`s.
//!
//! # Invariants
//! - Reserved properties derived from `objects` columns are never stored here.
//! - Rows are removed with their object (`ON DELETE CASCADE`).

use crate::error::{CmisError, CmisResult};
use crate::model::{Properties, PropertyValue};
use rusqlite::{params, Connection};

/// Loads every stored property of one object.
pub fn load_properties(conn: &Connection, object_id: &str) -> CmisResult<Properties> {
    let mut stmt = conn.prepare(
        "SELECT property_id, value_json
         FROM object_properties
         WHERE object_id = ?1
         ORDER BY property_id ASC;",
    )?;
    let mut rows = stmt.query([object_id])?;
    let mut properties = Properties::new();
    while let Some(row) = rows.next()? {
        let property_id: String = row.get(0)?;
        let raw: String = row.get(1)?;
        let value = serde_json::from_str::<PropertyValue>(&raw).map_err(|err| {
            CmisError::InvalidData(format!(
                "invalid value for `{property_id}` in object_properties.value_json: {err}"
            ))
        })?;
        properties.insert(property_id, value);
    }
    Ok(properties)
}

/// Inserts or replaces the given properties; others stay untouched.
pub fn upsert_properties(
    conn: &Connection,
    object_id: &str,
    properties: &Properties,
) -> CmisResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO object_properties (object_id, property_id, value_json)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(object_id, property_id) DO UPDATE SET value_json = excluded.value_json;",
    )?;
    for (property_id, value) in properties {
        let encoded = serde_json::to_string(value)?;
        stmt.execute(params![object_id, property_id, encoded])?;
    }
    Ok(())
}

/// Copies every stored property from one object to another.
pub fn copy_properties(conn: &Connection, from_id: &str, to_id: &str) -> CmisResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO object_properties (object_id, property_id, value_json)
         SELECT ?2, property_id, value_json
         FROM object_properties
         WHERE object_id = ?1;",
        params![from_id, to_id],
    )?;
    Ok(())
}
