//! JSON encoding and decoding for the CMIS browser binding.
//!
//! # Invariants
//! - Decoding never panics on unexpected shapes; it fails with `InvalidData`.
//! - Datetimes travel as epoch milliseconds (`dateTimeFormat=simple`).

use crate::error::{from_cmis_exception, CmisError, CmisResult};
use crate::model::{
    AllowableAction, BaseType, Properties, PropertyValue, QueryProperty, QueryRow, RepositoryInfo,
    RepositoryObject, TypeDefinition,
};
use serde_json::Value;
use std::collections::BTreeSet;

/// One repository entry from the service document.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct RepositoryEndpoint {
    pub info: RepositoryInfo,
    pub repository_url: String,
    pub root_folder_url: String,
}

/// Decodes the service document in server order.
pub(super) fn decode_repositories(value: &Value) -> CmisResult<Vec<RepositoryEndpoint>> {
    let entries = value
        .as_object()
        .ok_or_else(|| invalid("service document is not a JSON object"))?;

    let mut endpoints = Vec::with_capacity(entries.len());
    for entry in entries.values() {
        let id = str_field(entry, "repositoryId")
            .ok_or_else(|| invalid("repository entry without repositoryId"))?;
        let info = RepositoryInfo {
            id: id.to_string(),
            name: str_field(entry, "repositoryName").unwrap_or(id).to_string(),
            description: str_field(entry, "repositoryDescription")
                .unwrap_or_default()
                .to_string(),
            product_name: str_field(entry, "productName")
                .unwrap_or_default()
                .to_string(),
            product_version: str_field(entry, "productVersion")
                .unwrap_or_default()
                .to_string(),
            root_folder_id: str_field(entry, "rootFolderId")
                .ok_or_else(|| invalid(format!("repository `{id}` has no rootFolderId")))?
                .to_string(),
            cmis_version: str_field(entry, "cmisVersionSupported")
                .unwrap_or("1.1")
                .to_string(),
        };
        let repository_url = str_field(entry, "repositoryUrl")
            .ok_or_else(|| invalid(format!("repository `{id}` has no repositoryUrl")))?;
        let root_folder_url = str_field(entry, "rootFolderUrl")
            .ok_or_else(|| invalid(format!("repository `{id}` has no rootFolderUrl")))?;
        endpoints.push(RepositoryEndpoint {
            info,
            repository_url: repository_url.to_string(),
            root_folder_url: root_folder_url.to_string(),
        });
    }
    Ok(endpoints)
}

/// Decodes one object (properties, allowable actions, relationships).
pub(super) fn decode_object(value: &Value) -> CmisResult<RepositoryObject> {
    let properties = decode_properties(value)?;
    let actions = value
        .get("allowableActions")
        .map(decode_allowable_actions)
        .unwrap_or_default();

    let mut relationships = Vec::new();
    if let Some(items) = value.get("relationships").and_then(Value::as_array) {
        for item in items {
            if let RepositoryObject::Relationship(relationship) = decode_object(item)? {
                relationships.push(relationship);
            }
        }
    }

    RepositoryObject::from_parts(properties, actions, relationships)
}

/// Decodes `{"objects": [{"object": {...}}, ...]}` children pages.
pub(super) fn decode_object_list(value: &Value) -> CmisResult<Vec<RepositoryObject>> {
    let items = value
        .get("objects")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("object list without `objects` array"))?;
    items
        .iter()
        .map(|item| decode_object(item.get("object").unwrap_or(item)))
        .collect()
}

/// Decodes a version list, which the binding returns as a bare array.
pub(super) fn decode_object_array(value: &Value) -> CmisResult<Vec<RepositoryObject>> {
    match value {
        Value::Array(items) => items.iter().map(decode_object).collect(),
        other => decode_object_list(other),
    }
}

/// Property bag of an object, from `properties` or `succinctProperties`.
pub(super) fn decode_properties(value: &Value) -> CmisResult<Properties> {
    if let Some(entries) = value.get("properties").and_then(Value::as_object) {
        let mut properties = Properties::new();
        for (id, entry) in entries {
            let kind = str_field(entry, "type").unwrap_or("string");
            if let Some(decoded) = decode_property_value(kind, entry.get("value"))? {
                properties.insert(id.clone(), decoded);
            }
        }
        return Ok(properties);
    }

    if let Some(entries) = value.get("succinctProperties").and_then(Value::as_object) {
        let mut properties = Properties::new();
        for (id, raw) in entries {
            if let Some(decoded) = decode_untyped_value(raw) {
                properties.insert(id.clone(), decoded);
            }
        }
        return Ok(properties);
    }

    Err(invalid("object without properties"))
}

/// Decodes query results; each row keeps both property id and query name.
pub(super) fn decode_query_results(value: &Value) -> CmisResult<Vec<QueryRow>> {
    let results = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("query response without `results` array"))?;

    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        let entries = result
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("query row without properties"))?;
        let mut row = QueryRow::default();
        for (key, entry) in entries {
            let id = str_field(entry, "id").unwrap_or(key).to_string();
            let query_name = str_field(entry, "queryName").unwrap_or(key).to_string();
            let kind = str_field(entry, "type").unwrap_or("string");
            let values = match decode_property_value(kind, entry.get("value"))? {
                Some(PropertyValue::List(values)) => values,
                Some(single) => vec![single],
                None => Vec::new(),
            };
            row.properties.push(QueryProperty {
                id,
                query_name,
                values,
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

pub(super) fn decode_type_definition(value: &Value) -> CmisResult<TypeDefinition> {
    let id = str_field(value, "id").ok_or_else(|| invalid("type definition without id"))?;
    let base_text = str_field(value, "baseId")
        .ok_or_else(|| invalid(format!("type `{id}` without baseId")))?;
    let base_type = BaseType::parse(base_text)
        .ok_or_else(|| invalid(format!("type `{id}` has unknown baseId `{base_text}`")))?;

    let mut property_definitions = Vec::new();
    if let Some(definitions) = value.get("propertyDefinitions").and_then(Value::as_object) {
        for (key, definition) in definitions {
            let property_id = str_field(definition, "id").unwrap_or(key);
            let query_name = str_field(definition, "queryName").unwrap_or(property_id);
            property_definitions.push((property_id.to_string(), query_name.to_string()));
        }
    }

    Ok(TypeDefinition {
        id: id.to_string(),
        query_name: str_field(value, "queryName").unwrap_or(id).to_string(),
        display_name: str_field(value, "displayName").unwrap_or(id).to_string(),
        base_type,
        parent_type_id: str_field(value, "parentId").map(ToString::to_string),
        creatable: value
            .get("creatable")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        versionable: value
            .get("versionable")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        property_definitions,
    })
}

/// Id of the object a mutation returned.
pub(super) fn decode_object_id(value: &Value) -> CmisResult<String> {
    decode_properties(value)?
        .get(crate::model::property_ids::OBJECT_ID)
        .and_then(PropertyValue::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| invalid("response object without cmis:objectId"))
}

/// `{"ids": [...]}` returned by `deleteTree` on partial failure.
pub(super) fn decode_failed_ids(value: &Value) -> Vec<String> {
    value
        .get("ids")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Maps an error response to the taxonomy. Falls back on the HTTP status
/// when the body carries no `exception` field.
pub(super) fn decode_exception(status: u16, body: &str) -> CmisError {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(exception) = str_field(&value, "exception") {
            let message = str_field(&value, "message")
                .unwrap_or(exception)
                .to_string();
            return from_cmis_exception(exception, message);
        }
    }

    let message = format!("http status {status}");
    match status {
        400 => CmisError::InvalidArgument(message),
        401 | 403 => CmisError::PermissionDenied(message),
        404 => CmisError::NotFound(message),
        405 => CmisError::NotSupported(message),
        409 => CmisError::Constraint(message),
        _ => CmisError::Runtime(message),
    }
}

/// Form fields `propertyId[i]` / `propertyValue[i]` (`[i][j]` for lists).
pub(super) fn encode_properties(properties: &Properties) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for (index, (id, value)) in properties.iter().enumerate() {
        fields.push((format!("propertyId[{index}]"), id.clone()));
        match value {
            PropertyValue::List(values) => {
                for (position, item) in values.iter().enumerate() {
                    fields.push((
                        format!("propertyValue[{index}][{position}]"),
                        encode_scalar(item),
                    ));
                }
            }
            scalar => fields.push((format!("propertyValue[{index}]"), encode_scalar(scalar))),
        }
    }
    fields
}

fn encode_scalar(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(text) => text.clone(),
        PropertyValue::Boolean(flag) => flag.to_string(),
        PropertyValue::Integer(number) | PropertyValue::DateTime(number) => number.to_string(),
        PropertyValue::Decimal(number) => number.to_string(),
        PropertyValue::List(values) => values
            .iter()
            .map(encode_scalar)
            .collect::<Vec<_>>()
            .join(","),
    }
}

pub(super) fn decode_allowable_actions(value: &Value) -> BTreeSet<AllowableAction> {
    let Some(entries) = value.as_object() else {
        return BTreeSet::new();
    };
    entries
        .iter()
        .filter(|(_, granted)| granted.as_bool() == Some(true))
        .filter_map(|(name, _)| AllowableAction::parse(name))
        .collect()
}

fn decode_property_value(kind: &str, raw: Option<&Value>) -> CmisResult<Option<PropertyValue>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                if let Some(value) = decode_scalar(kind, item)? {
                    values.push(value);
                }
            }
            Ok(Some(PropertyValue::List(values)))
        }
        scalar => decode_scalar(kind, scalar),
    }
}

fn decode_scalar(kind: &str, raw: &Value) -> CmisResult<Option<PropertyValue>> {
    if raw.is_null() {
        return Ok(None);
    }
    let value = match kind {
        "boolean" => raw.as_bool().map(PropertyValue::Boolean),
        "integer" => raw.as_i64().map(PropertyValue::Integer),
        "decimal" => raw.as_f64().map(PropertyValue::Decimal),
        "datetime" => raw.as_i64().map(PropertyValue::DateTime),
        _ => raw.as_str().map(|text| PropertyValue::String(text.to_string())),
    };
    value
        .map(Some)
        .ok_or_else(|| invalid(format!("property value `{raw}` does not match type `{kind}`")))
}

fn decode_untyped_value(raw: &Value) -> Option<PropertyValue> {
    match raw {
        Value::Null => None,
        Value::Bool(flag) => Some(PropertyValue::Boolean(*flag)),
        Value::Number(number) => number
            .as_i64()
            .map(PropertyValue::Integer)
            .or_else(|| number.as_f64().map(PropertyValue::Decimal)),
        Value::String(text) => Some(PropertyValue::String(text.clone())),
        Value::Array(items) => Some(PropertyValue::List(
            items.iter().filter_map(decode_untyped_value).collect(),
        )),
        Value::Object(_) => None,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn invalid(message: impl Into<String>) -> CmisError {
    CmisError::InvalidData(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn typed(id: &str, kind: &str, value: Value) -> Value {
        json!({"id": id, "queryName": id, "type": kind, "cardinality": "single", "value": value})
    }

    #[test]
    fn repositories_keep_server_order() {
        let doc = json!({
            "second": {
                "repositoryId": "second",
                "rootFolderId": "root-2",
                "repositoryUrl": "http://host/browser/second",
                "rootFolderUrl": "http://host/browser/second/root"
            },
            "first": {
                "repositoryId": "first",
                "rootFolderId": "root-1",
                "repositoryUrl": "http://host/browser/first",
                "rootFolderUrl": "http://host/browser/first/root"
            }
        });
        let endpoints = decode_repositories(&doc).unwrap();
        assert_eq!(endpoints[0].info.id, "second");
        assert_eq!(endpoints[1].info.root_folder_id, "root-1");
    }

    #[test]
    fn decodes_document_with_actions_and_relationships() {
        let doc = json!({
            "properties": {
                "cmis:objectId": typed("cmis:objectId", "id", json!("doc-1;1.0")),
                "cmis:baseTypeId": typed("cmis:baseTypeId", "id", json!("cmis:document")),
                "cmis:name": typed("cmis:name", "string", json!("a.txt")),
                "cmis:creationDate": typed("cmis:creationDate", "datetime", json!(1700000000000_i64)),
                "cmis:contentStreamLength": typed("cmis:contentStreamLength", "integer", json!(5)),
                "cmis:secondaryObjectTypeIds": typed("cmis:secondaryObjectTypeIds", "id", json!(["P:sc:webable"]))
            },
            "allowableActions": {"canCheckOut": true, "canCheckIn": false},
            "relationships": [{
                "properties": {
                    "cmis:objectId": typed("cmis:objectId", "id", json!("rel-1")),
                    "cmis:baseTypeId": typed("cmis:baseTypeId", "id", json!("cmis:relationship")),
                    "cmis:sourceId": typed("cmis:sourceId", "id", json!("doc-1;1.0")),
                    "cmis:targetId": typed("cmis:targetId", "id", json!("doc-2;1.0"))
                }
            }]
        });
        let document = decode_object(&doc).unwrap().into_document().unwrap();
        assert_eq!(document.content_length, Some(5));
        assert_eq!(
            document.property("cmis:creationDate"),
            Some(&PropertyValue::DateTime(1_700_000_000_000))
        );
        assert!(document.can(AllowableAction::CanCheckOut));
        assert!(!document.can(AllowableAction::CanCheckIn));
        assert_eq!(document.relationships.len(), 1);
        assert_eq!(document.relationships[0].target_id, "doc-2;1.0");
        assert!(document.has_secondary_type("P:sc:webable"));
    }

    #[test]
    fn succinct_properties_are_accepted() {
        let doc = json!({"succinctProperties": {
            "cmis:objectId": "f-1",
            "cmis:baseTypeId": "cmis:folder",
            "cmis:name": "Sites",
            "cmis:path": "/Sites",
            "cmis:parentId": "root"
        }});
        let folder = decode_object(&doc).unwrap().into_folder().unwrap();
        assert_eq!(folder.path, "/Sites");
        assert_eq!(folder.parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn query_rows_keep_id_and_query_name() {
        let body = json!({"results": [{"properties": {
            "d.cmis:objectId": {"id": "cmis:objectId", "queryName": "d.cmis:objectId", "type": "id", "value": "doc-1"}
        }}]});
        let rows = decode_query_results(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].property_by_query_name("d.cmis:objectId").is_some());
        assert_eq!(
            rows[0].property_by_id("cmis:objectId").unwrap().values,
            vec![PropertyValue::String("doc-1".to_string())]
        );
    }

    #[test]
    fn type_definition_exposes_property_query_names() {
        let body = json!({
            "id": "cmis:folder",
            "queryName": "cmis:folder",
            "baseId": "cmis:folder",
            "creatable": true,
            "propertyDefinitions": {
                "cmis:objectId": {"id": "cmis:objectId", "queryName": "cmis:objectId"}
            }
        });
        let definition = decode_type_definition(&body).unwrap();
        assert_eq!(definition.base_type, BaseType::Folder);
        assert_eq!(
            definition.property_query_name("cmis:objectId"),
            Some("cmis:objectId")
        );
    }

    #[test]
    fn exceptions_map_by_name_then_status() {
        let body = r#"{"exception":"contentAlreadyExists","message":"dup"}"#;
        assert!(matches!(
            decode_exception(409, body),
            CmisError::AlreadyExists(message) if message == "dup"
        ));
        assert!(matches!(
            decode_exception(404, "<html/>"),
            CmisError::NotFound(_)
        ));
        assert!(matches!(
            decode_exception(500, ""),
            CmisError::Runtime(_)
        ));
    }

    #[test]
    fn properties_encode_as_indexed_form_fields() {
        let mut properties = Properties::new();
        properties.insert("cmis:name".to_string(), "a.txt".into());
        properties.insert(
            "cmis:secondaryObjectTypeIds".to_string(),
            vec!["P:sc:webable", "P:cm:titled"].into(),
        );
        let fields = encode_properties(&properties);
        assert_eq!(
            fields,
            vec![
                ("propertyId[0]".to_string(), "cmis:name".to_string()),
                ("propertyValue[0]".to_string(), "a.txt".to_string()),
                (
                    "propertyId[1]".to_string(),
                    "cmis:secondaryObjectTypeIds".to_string()
                ),
                ("propertyValue[1][0]".to_string(), "P:sc:webable".to_string()),
                ("propertyValue[1][1]".to_string(), "P:cm:titled".to_string()),
            ]
        );
    }
}
