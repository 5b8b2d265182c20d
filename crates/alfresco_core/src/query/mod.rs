//! CMIS-QL statements: builders for the facade and a parser for the
//! local repository.
//!
//! # Responsibility
//! - Build the exact statements the facade sends, with escaped literals.
//! - Parse the supported subset into a typed [`Statement`].
//! - Evaluate comparison predicates against property values.
//!
//! # Invariants
//! - Generated literals escape `\` and `'` with a backslash.
//! - Predicates combine with `AND` only.

use crate::model::PropertyValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

mod parser;

pub use parser::parse_statement;

/// Escapes a value for use inside a single-quoted CMIS-QL literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `SELECT * FROM cmis:folder WHERE cmis:name='<name>' [AND IN_FOLDER('<parent>')]`.
pub fn folder_by_name_query(name: &str, parent_id: Option<&str>) -> String {
    let mut statement = format!(
        "SELECT * FROM cmis:folder WHERE cmis:name='{}'",
        escape_literal(name)
    );
    if let Some(parent_id) = parent_id {
        statement.push_str(&format!(" AND IN_FOLDER('{}')", escape_literal(parent_id)));
    }
    statement
}

/// `SELECT * FROM cmis:document WHERE CONTAINS('<keyword>')`.
pub fn documents_containing_query(keyword: &str) -> String {
    format!(
        "SELECT * FROM cmis:document WHERE CONTAINS('{}')",
        escape_literal(keyword)
    )
}

/// `SELECT * FROM cmis:document WHERE IN_FOLDER('<folder id>')`.
pub fn documents_in_folder_query(folder_id: &str) -> String {
    format!(
        "SELECT * FROM cmis:document WHERE IN_FOLDER('{}')",
        escape_literal(folder_id)
    )
}

/// Parsed `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub select: Vec<SelectItem>,
    pub from: TypeRef,
    /// Secondary type joined on `cmis:objectId`.
    pub join: Option<TypeRef>,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
}

impl Statement {
    /// Whether `qualifier` names the joined type rather than the primary one.
    pub fn targets_join(&self, qualifier: Option<&str>) -> bool {
        match (qualifier, &self.join) {
            (Some(qualifier), Some(join)) => join.answers_to(qualifier),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Type id or query name as written.
    pub name: String,
    pub alias: Option<String>,
}

impl TypeRef {
    /// Whether `qualifier` refers to this type (by alias or by name).
    pub fn answers_to(&self, qualifier: &str) -> bool {
        self.alias.as_deref() == Some(qualifier) || self.name == qualifier
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    All,
    /// `alias.*`
    AllOf(String),
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub property: String,
}

impl ColumnRef {
    /// Query name as it appears in result rows.
    pub fn query_name(&self) -> String {
        match &self.qualifier {
            Some(qualifier) => format!("{qualifier}.{}", self.property),
            None => self.property.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Literal,
    },
    InFolder {
        qualifier: Option<String>,
        folder_id: String,
    },
    InTree {
        qualifier: Option<String>,
        folder_id: String,
    },
    Contains {
        qualifier: Option<String>,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub descending: bool,
}

impl Literal {
    /// Evaluates `value <op> self`. Multi-valued properties match when any
    /// entry matches; `<>` requires every entry to differ.
    pub fn matches(&self, op: CompareOp, value: &PropertyValue) -> bool {
        let entries = value.values();
        if op == CompareOp::NotEq {
            return entries
                .iter()
                .all(|entry| !self.matches_scalar(CompareOp::Eq, entry));
        }
        entries.iter().any(|entry| self.matches_scalar(op, entry))
    }

    fn matches_scalar(&self, op: CompareOp, value: &PropertyValue) -> bool {
        if op == CompareOp::Like {
            return match (self, value) {
                (Self::String(pattern), PropertyValue::String(text)) => like_matches(pattern, text),
                _ => false,
            };
        }
        let Some(ordering) = compare(value, self) else {
            return false;
        };
        match op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Like => false,
        }
    }
}

/// Orders a property value against a literal; `None` when types differ.
fn compare(value: &PropertyValue, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (PropertyValue::String(left), Literal::String(right)) => Some(left.as_str().cmp(right)),
        (PropertyValue::Boolean(left), Literal::Boolean(right)) => Some(left.cmp(right)),
        (PropertyValue::Integer(left) | PropertyValue::DateTime(left), Literal::Integer(right)) => {
            Some(left.cmp(right))
        }
        (PropertyValue::Integer(left) | PropertyValue::DateTime(left), Literal::Decimal(right)) => {
            (*left as f64).partial_cmp(right)
        }
        (PropertyValue::Decimal(left), Literal::Decimal(right)) => left.partial_cmp(right),
        (PropertyValue::Decimal(left), Literal::Integer(right)) => left.partial_cmp(&(*right as f64)),
        _ => None,
    }
}

/// Orders two property values for `ORDER BY`; mismatched kinds compare equal.
pub fn compare_values(left: &PropertyValue, right: &PropertyValue) -> Ordering {
    match (left, right) {
        (PropertyValue::String(a), PropertyValue::String(b)) => a.cmp(b),
        (PropertyValue::Boolean(a), PropertyValue::Boolean(b)) => a.cmp(b),
        (
            PropertyValue::Integer(a) | PropertyValue::DateTime(a),
            PropertyValue::Integer(b) | PropertyValue::DateTime(b),
        ) => a.cmp(b),
        (PropertyValue::Decimal(a), PropertyValue::Decimal(b)) => {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        }
        (PropertyValue::List(a), PropertyValue::List(b)) => match (a.first(), b.first()) {
            (Some(a), Some(b)) => compare_values(a, b),
            _ => a.len().cmp(&b.len()),
        },
        _ => Ordering::Equal,
    }
}

static LIKE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[%_\\]|%|_|[^%_\\]+|\\").expect("valid like token regex"));

/// CMIS `LIKE`: `%` any run, `_` one character, `\%` / `\_` literal.
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let mut expression = String::from("^");
    for token in LIKE_TOKEN_RE.find_iter(pattern) {
        match token.as_str() {
            "%" => expression.push_str(".*"),
            "_" => expression.push('.'),
            escaped if escaped.len() == 2 && escaped.starts_with('\\') => {
                expression.push_str(&regex::escape(&escaped[1..]));
            }
            literal => expression.push_str(&regex::escape(literal)),
        }
    }
    expression.push('$');
    Regex::new(&format!("(?s){expression}"))
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_escape_quotes_and_backslashes() {
        assert_eq!(
            folder_by_name_query("O'Brien\\docs", Some("f-1")),
            "SELECT * FROM cmis:folder WHERE cmis:name='O\\'Brien\\\\docs' AND IN_FOLDER('f-1')"
        );
        assert_eq!(
            documents_containing_query("alfresco"),
            "SELECT * FROM cmis:document WHERE CONTAINS('alfresco')"
        );
        assert_eq!(
            documents_in_folder_query("abc"),
            "SELECT * FROM cmis:document WHERE IN_FOLDER('abc')"
        );
    }

    #[test]
    fn like_handles_wildcards_and_escapes() {
        assert!(like_matches("rep%", "report.pdf"));
        assert!(like_matches("r_port%", "report.pdf"));
        assert!(!like_matches("rep", "report.pdf"));
        assert!(like_matches("100\\%", "100%"));
        assert!(!like_matches("100\\%", "1000"));
        assert!(like_matches("a.b", "a.b"));
        assert!(!like_matches("a.b", "axb"));
    }

    #[test]
    fn literal_matching_is_any_for_lists() {
        let aspects = PropertyValue::from(vec!["P:sc:webable", "P:cm:titled"]);
        let literal = Literal::String("P:cm:titled".to_string());
        assert!(literal.matches(CompareOp::Eq, &aspects));
        assert!(!literal.matches(CompareOp::NotEq, &aspects));
        assert!(Literal::Integer(3).matches(CompareOp::Lt, &PropertyValue::Integer(2)));
        assert!(!Literal::Boolean(true).matches(CompareOp::Eq, &PropertyValue::from("true")));
    }
}
