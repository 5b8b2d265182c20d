//! SQLite FTS5 matching for `CONTAINS` predicates.
//!
//! # Responsibility
//! - Turn a CMIS full-text expression into an FTS5 match expression.
//! - Return the ids of documents whose name or body matches.
//!
//! # Invariants
//! - Terms are quoted; a user expression can never inject FTS5 syntax.
//! - Blank expressions match nothing.

use crate::error::{CmisError, CmisResult};
use rusqlite::Connection;
use std::collections::HashSet;

/// Ids of every document row whose name or body matches `text`.
///
/// Terms are combined with `AND`; a leading `-` excludes a term.
pub fn match_document_ids(conn: &Connection, text: &str) -> CmisResult<HashSet<String>> {
    let Some(match_expr) = build_match_expression(text) else {
        return Ok(HashSet::new());
    };

    let mut stmt = conn.prepare(
        "SELECT object_id
         FROM document_fts
         WHERE document_fts MATCH ?1;",
    )?;
    let mut rows = stmt
        .query([match_expr.as_str()])
        .map_err(|err| map_query_error(err, &match_expr))?;

    let mut ids = HashSet::new();
    while let Some(row) = rows
        .next()
        .map_err(|err| map_query_error(err, &match_expr))?
    {
        ids.insert(row.get(0)?);
    }
    Ok(ids)
}

fn build_match_expression(text: &str) -> Option<String> {
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for term in text.split_whitespace() {
        match term.strip_prefix('-') {
            Some(rest) if !rest.is_empty() => excluded.push(escape_fts_term(rest)),
            Some(_) => {}
            None => included.push(escape_fts_term(term)),
        }
    }

    if included.is_empty() {
        return None;
    }

    let mut expression = included.join(" AND ");
    for term in excluded {
        expression.push_str(" NOT ");
        expression.push_str(&term);
    }
    Some(expression)
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> CmisError {
    if is_match_syntax_error(&err) {
        return CmisError::InvalidArgument(format!("invalid full-text query `{query}`: {err}"));
    }
    CmisError::from(err)
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::build_match_expression;

    #[test]
    fn terms_are_quoted_and_joined() {
        assert_eq!(
            build_match_expression("alfresco \"api\"").as_deref(),
            Some("\"alfresco\" AND \"\"\"api\"\"\"")
        );
    }

    #[test]
    fn excluded_terms_use_not() {
        assert_eq!(
            build_match_expression("report -draft").as_deref(),
            Some("\"report\" NOT \"draft\"")
        );
        assert_eq!(build_match_expression("  -draft "), None);
        assert_eq!(build_match_expression("   "), None);
    }
}
