//! Ordered schema steps for the repository store.
//!
//! Steps run inside one transaction; `user_version` is bumped after each so
//! a store never records a step whose SQL did not run. After the schema is
//! current the base type registry is checked, since every object row hangs
//! off one of those types.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, OptionalExtension};

/// Base types every object type must descend from.
pub const BASE_TYPE_IDS: [&str; 4] = [
    "cmis:document",
    "cmis:folder",
    "cmis:relationship",
    "cmis:secondary",
];

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "object_store",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "cmiscustom_model",
        sql: include_str!("0002_cmiscustom_model.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Runs the steps the store has not seen yet, then checks the type registry.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store is ahead of this build.
/// - `Migration` naming the first step that failed.
/// - `MissingBaseType` when a base type row was removed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = stored_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    if found < latest {
        let tx = conn.transaction()?;
        for step in STEPS.iter().filter(|step| step.version > found) {
            tx.execute_batch(step.sql)
                .and_then(|()| {
                    tx.execute_batch(&format!("PRAGMA user_version = {};", step.version))
                })
                .map_err(|source| DbError::Migration {
                    version: step.version,
                    name: step.name,
                    source,
                })?;
        }
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={}",
            found, latest
        );
    }

    ensure_base_types(conn)
}

fn ensure_base_types(conn: &Connection) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM object_types WHERE type_id = ?1 AND base_type = ?1;",
    )?;
    for type_id in BASE_TYPE_IDS {
        let present = stmt
            .query_row([type_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !present {
            return Err(DbError::MissingBaseType(type_id));
        }
    }
    Ok(())
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}
