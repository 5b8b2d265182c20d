//! Property values and the reserved CMIS property ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named property bag attached to repository objects.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Reserved CMIS property ids written or read by this crate.
pub mod property_ids {
    pub const OBJECT_ID: &str = "cmis:objectId";
    pub const NAME: &str = "cmis:name";
    pub const OBJECT_TYPE_ID: &str = "cmis:objectTypeId";
    pub const BASE_TYPE_ID: &str = "cmis:baseTypeId";
    pub const CREATED_BY: &str = "cmis:createdBy";
    pub const CREATION_DATE: &str = "cmis:creationDate";
    pub const LAST_MODIFICATION_DATE: &str = "cmis:lastModificationDate";
    pub const PATH: &str = "cmis:path";
    pub const PARENT_ID: &str = "cmis:parentId";
    pub const VERSION_LABEL: &str = "cmis:versionLabel";
    pub const VERSION_SERIES_ID: &str = "cmis:versionSeriesId";
    pub const IS_LATEST_VERSION: &str = "cmis:isLatestVersion";
    pub const IS_MAJOR_VERSION: &str = "cmis:isMajorVersion";
    pub const IS_PRIVATE_WORKING_COPY: &str = "cmis:isPrivateWorkingCopy";
    pub const IS_VERSION_SERIES_CHECKED_OUT: &str = "cmis:isVersionSeriesCheckedOut";
    pub const CHECKIN_COMMENT: &str = "cmis:checkinComment";
    pub const CONTENT_STREAM_LENGTH: &str = "cmis:contentStreamLength";
    pub const CONTENT_STREAM_MIME_TYPE: &str = "cmis:contentStreamMimeType";
    pub const CONTENT_STREAM_FILE_NAME: &str = "cmis:contentStreamFileName";
    pub const SOURCE_ID: &str = "cmis:sourceId";
    pub const TARGET_ID: &str = "cmis:targetId";
    pub const SECONDARY_OBJECT_TYPE_IDS: &str = "cmis:secondaryObjectTypeIds";

    /// Ids maintained by the repository itself; callers cannot set them.
    pub const READ_ONLY: &[&str] = &[
        OBJECT_ID,
        BASE_TYPE_ID,
        CREATED_BY,
        LAST_MODIFICATION_DATE,
        PATH,
        PARENT_ID,
        VERSION_LABEL,
        VERSION_SERIES_ID,
        IS_LATEST_VERSION,
        IS_MAJOR_VERSION,
        IS_PRIVATE_WORKING_COPY,
        IS_VERSION_SERIES_CHECKED_OUT,
        CHECKIN_COMMENT,
        CONTENT_STREAM_LENGTH,
        CONTENT_STREAM_MIME_TYPE,
        CONTENT_STREAM_FILE_NAME,
    ];
}

/// One property value. Multi-valued properties use `List`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    /// Unix epoch milliseconds.
    DateTime(i64),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// String view of single-valued string properties, or the first list entry.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            Self::List(values) => values.first().and_then(Self::as_str),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            Self::List(values) => values.first().and_then(Self::as_bool),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) | Self::DateTime(value) => Some(*value),
            Self::List(values) => values.first().and_then(Self::as_i64),
            _ => None,
        }
    }

    /// All string entries of a multi-valued property (single values count as one).
    pub fn string_values(&self) -> Vec<String> {
        match self {
            Self::String(value) => vec![value.clone()],
            Self::List(values) => values
                .iter()
                .filter_map(|value| value.as_str().map(ToString::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Single-valued entries, flattening one level of `List`.
    pub fn values(&self) -> Vec<&PropertyValue> {
        match self {
            Self::List(values) => values.iter().collect(),
            other => vec![other],
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::PropertyValue;

    #[test]
    fn list_accessors_read_first_entry() {
        let value = PropertyValue::from(vec!["P:sc:webable", "P:cm:author"]);
        assert_eq!(value.as_str(), Some("P:sc:webable"));
        assert_eq!(
            value.string_values(),
            vec!["P:sc:webable".to_string(), "P:cm:author".to_string()]
        );
    }

    #[test]
    fn serde_shape_is_tagged() {
        let json = serde_json::to_string(&PropertyValue::Boolean(true)).unwrap();
        assert_eq!(json, r#"{"type":"boolean","value":true}"#);
        let back: PropertyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PropertyValue::Boolean(true));
    }
}
