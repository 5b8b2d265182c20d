//! Repository-level descriptors, fetch contexts and query rows.

use super::content::ContentStream;
use super::object::BaseType;
use super::property::{Properties, PropertyValue};
use serde::{Deserialize, Serialize};

/// Identity of the repository a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub product_name: String,
    pub product_version: String,
    pub root_folder_id: String,
    pub cmis_version: String,
}

/// Object type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub id: String,
    pub query_name: String,
    pub display_name: String,
    pub base_type: BaseType,
    pub parent_type_id: Option<String>,
    pub creatable: bool,
    pub versionable: bool,
    /// `(property id, query name)` pairs declared by this type.
    pub property_definitions: Vec<(String, String)>,
}

impl TypeDefinition {
    /// Minimal definition: query name equals id, display name equals id.
    pub fn new(id: impl Into<String>, base_type: BaseType, parent_type_id: Option<&str>) -> Self {
        let id = id.into();
        Self {
            query_name: id.clone(),
            display_name: id.clone(),
            id,
            base_type,
            parent_type_id: parent_type_id.map(ToString::to_string),
            creatable: true,
            versionable: base_type == BaseType::Document,
            property_definitions: Vec::new(),
        }
    }

    /// Query name declared for `property_id`, if the type lists one.
    pub fn property_query_name(&self, property_id: &str) -> Option<&str> {
        self.property_definitions
            .iter()
            .find(|(id, _)| id == property_id)
            .map(|(_, query_name)| query_name.as_str())
    }
}

/// Relationship inclusion policy for object fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncludeRelationships {
    #[default]
    None,
    Source,
    Target,
    Both,
}

impl IncludeRelationships {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Source => "source",
            Self::Target => "target",
            Self::Both => "both",
        }
    }
}

/// Per-call fetch options passed to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    pub cache_enabled: bool,
    pub include_relationships: IncludeRelationships,
    pub include_allowable_actions: bool,
}

impl OperationContext {
    pub fn with_cache(cache_enabled: bool) -> Self {
        Self {
            cache_enabled,
            ..Self::default()
        }
    }

    pub fn fresh() -> Self {
        Self::with_cache(false)
    }

    pub fn include_relationships(mut self, include: IncludeRelationships) -> Self {
        self.include_relationships = include;
        self
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            include_relationships: IncludeRelationships::None,
            include_allowable_actions: true,
        }
    }
}

/// Versioning state requested when creating a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersioningState {
    None,
    #[default]
    Major,
    Minor,
    CheckedOut,
}

impl VersioningState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::CheckedOut => "checkedout",
        }
    }
}

/// What happens to multi-filed objects during a tree delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnfileObject {
    Unfile,
    DeleteSingleFiled,
    #[default]
    Delete,
}

impl UnfileObject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unfile => "unfile",
            Self::DeleteSingleFiled => "deletesinglefiled",
            Self::Delete => "delete",
        }
    }
}

/// Check-in request applied to a private working copy.
#[derive(Debug)]
pub struct CheckIn {
    pub major: bool,
    pub properties: Properties,
    pub content: Option<ContentStream>,
    pub comment: Option<String>,
}

/// One column of a query result row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryProperty {
    pub id: String,
    pub query_name: String,
    pub values: Vec<PropertyValue>,
}

impl QueryProperty {
    pub fn first_value(&self) -> Option<&PropertyValue> {
        self.values.first()
    }
}

/// One query result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRow {
    pub properties: Vec<QueryProperty>,
}

impl QueryRow {
    pub fn property_by_id(&self, id: &str) -> Option<&QueryProperty> {
        self.properties.iter().find(|property| property.id == id)
    }

    pub fn property_by_query_name(&self, query_name: &str) -> Option<&QueryProperty> {
        self.properties
            .iter()
            .find(|property| property.query_name == query_name)
    }
}
