//! Full-text search entry points.
//!
//! # Responsibility
//! - Back the `CONTAINS` query predicate with the SQLite FTS5 index.

pub mod fts;

pub use fts::match_document_ids;
