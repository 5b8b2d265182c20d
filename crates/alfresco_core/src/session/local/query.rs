//! Evaluation of parsed CMIS-QL statements against the local store.
//!
//! # Invariants
//! - Type matching includes subtypes of the `FROM` and `JOIN` types.
//! - Working copies never match; older versions match only when
//!   `search_all_versions` is set.
//! - A missing property never satisfies a comparison.

use super::object_properties;
use crate::error::{CmisError, CmisResult};
use crate::model::{
    property_ids, BaseType, Properties, PropertyValue, QueryProperty, QueryRow, TypeDefinition,
};
use crate::query::{compare_values, ColumnRef, CompareOp, Literal, Predicate, SelectItem, Statement};
use crate::repo::object_repo::{ObjectRecord, ObjectRepository, SqliteObjectRepository};
use crate::repo::type_repo::{SqliteTypeRepository, TypeRepository};
use crate::search::match_document_ids;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::HashSet;

const DEFAULT_PAGE_SIZE: usize = 100;
/// Alfresco node-ref prefix some callers put in front of folder ids.
const NODE_REF_PREFIX: &str = "workspace://SpacesStore/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Primary,
    Joined,
}

struct JoinedType {
    definition: TypeDefinition,
    type_ids: HashSet<String>,
}

/// Resolved types of one statement.
struct Resolved<'a> {
    statement: &'a Statement,
    primary: TypeDefinition,
    joined: Option<JoinedType>,
}

impl Resolved<'_> {
    fn scope(&self, qualifier: Option<&str>) -> CmisResult<Scope> {
        match qualifier {
            None => Ok(Scope::Primary),
            Some(qualifier) if self.statement.from.answers_to(qualifier) => Ok(Scope::Primary),
            Some(qualifier) if self.statement.targets_join(Some(qualifier)) => Ok(Scope::Joined),
            Some(qualifier) => Err(CmisError::InvalidArgument(format!(
                "invalid query: unknown qualifier `{qualifier}`"
            ))),
        }
    }

    fn definition(&self, scope: Scope) -> &TypeDefinition {
        match (scope, &self.joined) {
            (Scope::Joined, Some(joined)) => &joined.definition,
            _ => &self.primary,
        }
    }

    /// Maps a column (query name) to the property id it reads.
    fn property_id(&self, column: &ColumnRef) -> CmisResult<String> {
        let definition = self.definition(self.scope(column.qualifier.as_deref())?);
        Ok(definition
            .property_definitions
            .iter()
            .find(|(_, query_name)| *query_name == column.property)
            .map(|(id, _)| id.clone())
            .unwrap_or_else(|| column.property.clone()))
    }
}

enum Filter {
    Compare {
        property_id: String,
        op: CompareOp,
        value: Literal,
    },
    /// Object is filed in one of these folders.
    Parent(HashSet<String>),
    /// Object id is one of these.
    Ids(HashSet<String>),
}

impl Filter {
    fn accepts(&self, record: &ObjectRecord, properties: &Properties) -> bool {
        match self {
            Self::Compare {
                property_id,
                op,
                value,
            } => properties
                .get(property_id)
                .is_some_and(|actual| value.matches(*op, actual)),
            Self::Parent(folder_ids) => record
                .parent_id
                .as_ref()
                .is_some_and(|parent_id| folder_ids.contains(parent_id)),
            Self::Ids(ids) => ids.contains(&record.object_id),
        }
    }
}

pub(super) fn execute(
    conn: &Connection,
    statement: &Statement,
    search_all_versions: bool,
    max_items: Option<u32>,
) -> CmisResult<Vec<QueryRow>> {
    let types = SqliteTypeRepository::new(conn);
    let objects = SqliteObjectRepository::new(conn);

    let primary = lookup_type(&types, &statement.from.name)?;
    if !matches!(
        primary.base_type,
        BaseType::Document | BaseType::Folder | BaseType::Relationship
    ) {
        return Err(CmisError::InvalidArgument(format!(
            "invalid query: type `{}` cannot be selected from directly",
            primary.id
        )));
    }
    let joined = match &statement.join {
        Some(join) => {
            let definition = lookup_type(&types, &join.name)?;
            if definition.base_type != BaseType::Secondary {
                return Err(CmisError::InvalidArgument(format!(
                    "invalid query: only secondary types can be joined, `{}` is not one",
                    definition.id
                )));
            }
            let type_ids = types.subtype_ids(&definition.id)?.into_iter().collect();
            Some(JoinedType {
                definition,
                type_ids,
            })
        }
        None => None,
    };
    let resolved = Resolved {
        statement,
        primary,
        joined,
    };

    let filters = statement
        .predicates
        .iter()
        .map(|predicate| build_filter(conn, &resolved, predicate))
        .collect::<CmisResult<Vec<_>>>()?;
    let order = match &statement.order_by {
        Some(order_by) => Some((resolved.property_id(&order_by.column)?, order_by.descending)),
        None => None,
    };

    let candidates =
        objects.list_by_types(&types.subtype_ids(&resolved.primary.id)?, search_all_versions)?;
    let mut matches = Vec::new();
    for record in candidates {
        let properties = object_properties(conn, &record)?;
        if let Some(joined) = &resolved.joined {
            if !has_secondary_type(&properties, &joined.type_ids) {
                continue;
            }
        }
        if filters
            .iter()
            .all(|filter| filter.accepts(&record, &properties))
        {
            matches.push(properties);
        }
    }

    if let Some((property_id, descending)) = &order {
        matches.sort_by(|left, right| {
            let ordering = match (left.get(property_id), right.get(property_id)) {
                (Some(left), Some(right)) => compare_values(left, right),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if *descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let page_size = match max_items {
        Some(limit) if limit > 0 => limit as usize,
        _ => DEFAULT_PAGE_SIZE,
    };
    matches
        .iter()
        .take(page_size)
        .map(|properties| project(&resolved, properties))
        .collect()
}

fn build_filter(conn: &Connection, resolved: &Resolved<'_>, predicate: &Predicate) -> CmisResult<Filter> {
    match predicate {
        Predicate::Compare { column, op, value } => Ok(Filter::Compare {
            property_id: resolved.property_id(column)?,
            op: *op,
            value: value.clone(),
        }),
        Predicate::InFolder {
            qualifier,
            folder_id,
        } => {
            resolved.scope(qualifier.as_deref())?;
            Ok(Filter::Parent(HashSet::from([
                node_id(folder_id).to_string()
            ])))
        }
        Predicate::InTree {
            qualifier,
            folder_id,
        } => {
            resolved.scope(qualifier.as_deref())?;
            let subtree = SqliteObjectRepository::new(conn).folder_subtree_ids(node_id(folder_id))?;
            Ok(Filter::Parent(subtree.into_iter().collect()))
        }
        Predicate::Contains { qualifier, text } => {
            resolved.scope(qualifier.as_deref())?;
            Ok(Filter::Ids(match_document_ids(conn, text)?))
        }
    }
}

fn project(resolved: &Resolved<'_>, properties: &Properties) -> CmisResult<QueryRow> {
    let mut row = QueryRow::default();
    for item in &resolved.statement.select {
        match item {
            SelectItem::All => {
                for (id, value) in properties {
                    let query_name = resolved.primary.property_query_name(id).unwrap_or(id);
                    row.properties
                        .push(column(id, query_name.to_string(), Some(value)));
                }
            }
            SelectItem::AllOf(qualifier) => match resolved.scope(Some(qualifier))? {
                Scope::Primary => {
                    for (id, value) in properties {
                        let query_name = resolved.primary.property_query_name(id).unwrap_or(id);
                        row.properties.push(column(
                            id,
                            format!("{qualifier}.{query_name}"),
                            Some(value),
                        ));
                    }
                }
                Scope::Joined => {
                    let definition = resolved.definition(Scope::Joined);
                    for (id, query_name) in &definition.property_definitions {
                        row.properties.push(column(
                            id,
                            format!("{qualifier}.{query_name}"),
                            properties.get(id),
                        ));
                    }
                }
            },
            SelectItem::Column(selected) => {
                let id = resolved.property_id(selected)?;
                row.properties
                    .push(column(&id, selected.query_name(), properties.get(&id)));
            }
        }
    }
    Ok(row)
}

fn column(id: &str, query_name: String, value: Option<&PropertyValue>) -> QueryProperty {
    let values = match value {
        Some(PropertyValue::List(values)) => values.clone(),
        Some(value) => vec![value.clone()],
        None => Vec::new(),
    };
    QueryProperty {
        id: id.to_string(),
        query_name,
        values,
    }
}

fn lookup_type(types: &SqliteTypeRepository<'_>, name: &str) -> CmisResult<TypeDefinition> {
    types
        .resolve_type_id(name)?
        .map(|type_id| types.get_type(&type_id))
        .transpose()?
        .flatten()
        .ok_or_else(|| CmisError::InvalidArgument(format!("invalid query: unknown type `{name}`")))
}

fn has_secondary_type(properties: &Properties, type_ids: &HashSet<String>) -> bool {
    properties
        .get(property_ids::SECONDARY_OBJECT_TYPE_IDS)
        .map(PropertyValue::string_values)
        .is_some_and(|attached| attached.iter().any(|id| type_ids.contains(id)))
}

fn node_id(id: &str) -> &str {
    id.strip_prefix(NODE_REF_PREFIX).unwrap_or(id)
}
