//! Typed repository objects decoded from property bags.
//!
//! # Responsibility
//! - Expose folders, documents and relationships as plain snapshots.
//! - Decode every object shape from `(properties, allowable actions,
//!   relationships)` so all sessions agree on the result.
//!
//! # Invariants
//! - `cmis:objectId` and `cmis:baseTypeId` are mandatory; anything else
//!   missing decodes to an empty/`None` field.

use super::property::{property_ids, Properties, PropertyValue};
use crate::error::{CmisError, CmisResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Server-assigned object identifier.
pub type ObjectId = String;

/// CMIS base type of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Document,
    Folder,
    Relationship,
    Secondary,
    Policy,
    Item,
}

impl BaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "cmis:document",
            Self::Folder => "cmis:folder",
            Self::Relationship => "cmis:relationship",
            Self::Secondary => "cmis:secondary",
            Self::Policy => "cmis:policy",
            Self::Item => "cmis:item",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cmis:document" => Some(Self::Document),
            "cmis:folder" => Some(Self::Folder),
            "cmis:relationship" => Some(Self::Relationship),
            "cmis:secondary" => Some(Self::Secondary),
            "cmis:policy" => Some(Self::Policy),
            "cmis:item" => Some(Self::Item),
            _ => None,
        }
    }
}

/// Actions the current user may perform on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AllowableAction {
    CanCheckOut,
    CanCheckIn,
    CanCancelCheckOut,
    CanDeleteObject,
    CanUpdateProperties,
    CanGetContentStream,
    CanGetChildren,
    CanCreateDocument,
    CanCreateFolder,
    CanDeleteTree,
    CanGetAllVersions,
    CanCreateRelationship,
}

const ALL_ACTIONS: &[AllowableAction] = &[
    AllowableAction::CanCheckOut,
    AllowableAction::CanCheckIn,
    AllowableAction::CanCancelCheckOut,
    AllowableAction::CanDeleteObject,
    AllowableAction::CanUpdateProperties,
    AllowableAction::CanGetContentStream,
    AllowableAction::CanGetChildren,
    AllowableAction::CanCreateDocument,
    AllowableAction::CanCreateFolder,
    AllowableAction::CanDeleteTree,
    AllowableAction::CanGetAllVersions,
    AllowableAction::CanCreateRelationship,
];

impl AllowableAction {
    /// Wire name used in `allowableActions` maps.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanCheckOut => "canCheckOut",
            Self::CanCheckIn => "canCheckIn",
            Self::CanCancelCheckOut => "canCancelCheckOut",
            Self::CanDeleteObject => "canDeleteObject",
            Self::CanUpdateProperties => "canUpdateProperties",
            Self::CanGetContentStream => "canGetContentStream",
            Self::CanGetChildren => "canGetChildren",
            Self::CanCreateDocument => "canCreateDocument",
            Self::CanCreateFolder => "canCreateFolder",
            Self::CanDeleteTree => "canDeleteTree",
            Self::CanGetAllVersions => "canGetAllVersions",
            Self::CanCreateRelationship => "canCreateRelationship",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        ALL_ACTIONS
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
    }
}

/// Container node.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: ObjectId,
    pub name: String,
    pub type_id: String,
    /// Absolute repository path; the root folder is `/`.
    pub path: String,
    /// `None` only for the root folder.
    pub parent_id: Option<ObjectId>,
    pub properties: Properties,
    pub allowable_actions: BTreeSet<AllowableAction>,
}

impl Folder {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Path of a direct child named `name`.
    pub fn child_path(&self, name: &str) -> String {
        if self.path.ends_with('/') {
            format!("{}{name}", self.path)
        } else {
            format!("{}/{name}", self.path)
        }
    }

    pub fn property(&self, id: &str) -> Option<&PropertyValue> {
        self.properties.get(id)
    }
}

/// One version of a versionable content item.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: ObjectId,
    pub name: String,
    pub type_id: String,
    pub version_series_id: Option<String>,
    pub version_label: Option<String>,
    pub is_latest_version: bool,
    pub is_major_version: bool,
    pub is_private_working_copy: bool,
    pub is_version_series_checked_out: bool,
    pub checkin_comment: Option<String>,
    pub content_length: Option<u64>,
    pub content_mime_type: Option<String>,
    pub content_file_name: Option<String>,
    pub secondary_type_ids: Vec<String>,
    pub properties: Properties,
    pub allowable_actions: BTreeSet<AllowableAction>,
    /// Populated only when the fetch asked for relationships.
    pub relationships: Vec<Relationship>,
}

impl Document {
    pub fn can(&self, action: AllowableAction) -> bool {
        self.allowable_actions.contains(&action)
    }

    pub fn property(&self, id: &str) -> Option<&PropertyValue> {
        self.properties.get(id)
    }

    pub fn version_label(&self) -> Option<&str> {
        self.version_label.as_deref()
    }

    /// Whether `secondary` (type id or its local name) is attached.
    pub fn has_secondary_type(&self, secondary: &str) -> bool {
        self.secondary_type_ids
            .iter()
            .any(|id| id == secondary || local_type_name(id) == secondary)
    }
}

/// Directed typed link between two objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: ObjectId,
    pub type_id: String,
    pub source_id: ObjectId,
    pub target_id: ObjectId,
    pub properties: Properties,
}

/// Any object a session can return.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryObject {
    Folder(Folder),
    Document(Document),
    Relationship(Relationship),
    Other {
        id: ObjectId,
        base_type: BaseType,
        properties: Properties,
    },
}

impl RepositoryObject {
    /// Decodes an object from its property bag plus side data.
    pub fn from_parts(
        properties: Properties,
        allowable_actions: BTreeSet<AllowableAction>,
        relationships: Vec<Relationship>,
    ) -> CmisResult<Self> {
        let id = required_string(&properties, property_ids::OBJECT_ID)?;
        let base_text = required_string(&properties, property_ids::BASE_TYPE_ID)?;
        let base_type = BaseType::parse(&base_text).ok_or_else(|| {
            CmisError::InvalidData(format!("unknown base type `{base_text}` for {id}"))
        })?;
        let name = optional_string(&properties, property_ids::NAME).unwrap_or_default();
        let type_id = optional_string(&properties, property_ids::OBJECT_TYPE_ID)
            .unwrap_or_else(|| base_text.clone());

        let object = match base_type {
            BaseType::Folder => Self::Folder(Folder {
                path: optional_string(&properties, property_ids::PATH).unwrap_or_default(),
                parent_id: optional_string(&properties, property_ids::PARENT_ID),
                id,
                name,
                type_id,
                properties,
                allowable_actions,
            }),
            BaseType::Document => Self::Document(Document {
                version_series_id: optional_string(&properties, property_ids::VERSION_SERIES_ID),
                version_label: optional_string(&properties, property_ids::VERSION_LABEL),
                is_latest_version: flag(&properties, property_ids::IS_LATEST_VERSION),
                is_major_version: flag(&properties, property_ids::IS_MAJOR_VERSION),
                is_private_working_copy: flag(&properties, property_ids::IS_PRIVATE_WORKING_COPY),
                is_version_series_checked_out: flag(
                    &properties,
                    property_ids::IS_VERSION_SERIES_CHECKED_OUT,
                ),
                checkin_comment: optional_string(&properties, property_ids::CHECKIN_COMMENT),
                content_length: properties
                    .get(property_ids::CONTENT_STREAM_LENGTH)
                    .and_then(PropertyValue::as_i64)
                    .and_then(|value| u64::try_from(value).ok()),
                content_mime_type: optional_string(
                    &properties,
                    property_ids::CONTENT_STREAM_MIME_TYPE,
                ),
                content_file_name: optional_string(
                    &properties,
                    property_ids::CONTENT_STREAM_FILE_NAME,
                ),
                secondary_type_ids: properties
                    .get(property_ids::SECONDARY_OBJECT_TYPE_IDS)
                    .map(PropertyValue::string_values)
                    .unwrap_or_default(),
                id,
                name,
                type_id,
                properties,
                allowable_actions,
                relationships,
            }),
            BaseType::Relationship => Self::Relationship(Relationship {
                source_id: required_string(&properties, property_ids::SOURCE_ID)?,
                target_id: required_string(&properties, property_ids::TARGET_ID)?,
                id,
                type_id,
                properties,
            }),
            other => Self::Other {
                id,
                base_type: other,
                properties,
            },
        };
        Ok(object)
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.id,
            Self::Document(document) => &document.id,
            Self::Relationship(relationship) => &relationship.id,
            Self::Other { id, .. } => id,
        }
    }

    pub fn base_type(&self) -> BaseType {
        match self {
            Self::Folder(_) => BaseType::Folder,
            Self::Document(_) => BaseType::Document,
            Self::Relationship(_) => BaseType::Relationship,
            Self::Other { base_type, .. } => *base_type,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Folder(folder) => Some(&folder.name),
            Self::Document(document) => Some(&document.name),
            Self::Relationship(relationship) => relationship
                .properties
                .get(property_ids::NAME)
                .and_then(PropertyValue::as_str),
            Self::Other { properties, .. } => properties
                .get(property_ids::NAME)
                .and_then(PropertyValue::as_str),
        }
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Self::Folder(folder) => &folder.properties,
            Self::Document(document) => &document.properties,
            Self::Relationship(relationship) => &relationship.properties,
            Self::Other { properties, .. } => properties,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn into_folder(self) -> Option<Folder> {
        match self {
            Self::Folder(folder) => Some(folder),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::Document(document) => Some(document),
            _ => None,
        }
    }
}

/// `P:sc:webable` -> `webable`; ids without a namespace are returned as-is.
pub fn local_type_name(type_id: &str) -> &str {
    type_id.rsplit(':').next().unwrap_or(type_id)
}

fn required_string(properties: &Properties, id: &str) -> CmisResult<String> {
    optional_string(properties, id)
        .ok_or_else(|| CmisError::InvalidData(format!("missing required property `{id}`")))
}

fn optional_string(properties: &Properties, id: &str) -> Option<String> {
    properties
        .get(id)
        .and_then(PropertyValue::as_str)
        .map(ToString::to_string)
}

fn flag(properties: &Properties, id: &str) -> bool {
    properties
        .get(id)
        .and_then(PropertyValue::as_bool)
        .unwrap_or(false)
}
