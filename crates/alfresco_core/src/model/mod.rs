//! Repository object model shared by every session implementation.
//!
//! # Responsibility
//! - Define the typed shapes callers receive (folders, documents, relationships).
//! - Decode those shapes from a CMIS property bag in exactly one place.
//!
//! # Invariants
//! - Objects are snapshots; refreshing means asking the session again.
//! - Reserved property ids live in [`property::property_ids`].

pub mod content;
pub mod object;
pub mod property;
pub mod repository;

pub use content::ContentStream;
pub use object::{
    AllowableAction, BaseType, Document, Folder, ObjectId, Relationship, RepositoryObject,
};
pub use property::{property_ids, Properties, PropertyValue};
pub use repository::{
    CheckIn, IncludeRelationships, OperationContext, QueryProperty, QueryRow, RepositoryInfo,
    TypeDefinition, UnfileObject, VersioningState,
};
