//! Tokenizer and recursive-descent parser for the supported CMIS-QL subset.
//!
//! ```text
//! SELECT * | alias.* | column [, ...]
//! FROM type [AS] [alias]
//! [[INNER] JOIN type [AS] [alias] ON a.cmis:objectId = b.cmis:objectId]
//! [WHERE predicate [AND predicate ...]]
//! [ORDER BY column [ASC|DESC]]
//! ```

use super::{ColumnRef, CompareOp, Literal, OrderBy, Predicate, SelectItem, Statement, TypeRef};
use crate::error::{CmisError, CmisResult};
use crate::model::property_ids;
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?P<string>'(?:[^'\\]|\\.)*')|(?P<number>-?\d+(?:\.\d+)?)|(?P<ident>[A-Za-z_][A-Za-z0-9_:\-]*)|(?P<symbol><>|<=|>=|[=<>(),*.]))",
    )
    .expect("valid cmis-ql token regex")
});

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Number(String),
    Ident(String),
    Symbol(String),
}

/// Parses one statement.
///
/// # Errors
/// - `InvalidArgument` for anything outside the supported subset.
pub fn parse_statement(input: &str) -> CmisResult<Statement> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let statement = parser.statement()?;
    if let Some(token) = parser.peek() {
        return Err(syntax(format!("unexpected trailing token {token:?}")));
    }
    Ok(statement)
}

fn tokenize(input: &str) -> CmisResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    loop {
        if rest.trim().is_empty() {
            return Ok(tokens);
        }
        let captures = TOKEN_RE.captures(rest).ok_or_else(|| {
            syntax(format!(
                "unexpected input at offset {}",
                input.len() - rest.trim_start().len()
            ))
        })?;
        let consumed = captures.get(0).map_or(0, |whole| whole.end());
        let token = if let Some(text) = captures.name("string") {
            Token::Str(unescape(&text.as_str()[1..text.as_str().len() - 1]))
        } else if let Some(text) = captures.name("number") {
            Token::Number(text.as_str().to_string())
        } else if let Some(text) = captures.name("ident") {
            Token::Ident(text.as_str().to_string())
        } else if let Some(text) = captures.name("symbol") {
            Token::Symbol(text.as_str().to_string())
        } else {
            return Err(syntax("unrecognized token"));
        };
        tokens.push(token);
        rest = &rest[consumed..];
    }
}

fn unescape(raw: &str) -> String {
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                value.push(next);
            }
        } else {
            value.push(ch);
        }
    }
    value
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.position += 1;
            return true;
        }
        false
    }

    fn expect_keyword(&mut self, keyword: &str) -> CmisResult<()> {
        if self.eat_keyword(keyword) {
            return Ok(());
        }
        Err(syntax(format!("expected `{keyword}`, found {:?}", self.peek())))
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(found)) if found == symbol) {
            self.position += 1;
            return true;
        }
        false
    }

    fn expect_symbol(&mut self, symbol: &str) -> CmisResult<()> {
        if self.eat_symbol(symbol) {
            return Ok(());
        }
        Err(syntax(format!("expected `{symbol}`, found {:?}", self.peek())))
    }

    fn identifier(&mut self) -> CmisResult<String> {
        match self.next() {
            Some(Token::Ident(word)) if !is_reserved(&word) => Ok(word),
            other => Err(syntax(format!("expected identifier, found {other:?}"))),
        }
    }

    fn string_literal(&mut self) -> CmisResult<String> {
        match self.next() {
            Some(Token::Str(text)) => Ok(text),
            other => Err(syntax(format!("expected string literal, found {other:?}"))),
        }
    }

    fn statement(&mut self) -> CmisResult<Statement> {
        self.expect_keyword("SELECT")?;
        let select = self.select_list()?;
        self.expect_keyword("FROM")?;
        let from = self.type_ref()?;

        let join = if self.eat_keyword("INNER") {
            self.expect_keyword("JOIN")?;
            Some(self.join_clause()?)
        } else if self.eat_keyword("JOIN") {
            Some(self.join_clause()?)
        } else {
            None
        };

        let mut predicates = Vec::new();
        if self.eat_keyword("WHERE") {
            predicates.push(self.predicate()?);
            while self.eat_keyword("AND") {
                predicates.push(self.predicate()?);
            }
            if self.peek_keyword("OR") {
                return Err(syntax("`OR` is not supported"));
            }
        }

        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = self.column()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };

        Ok(Statement {
            select,
            from,
            join,
            predicates,
            order_by,
        })
    }

    fn select_list(&mut self) -> CmisResult<Vec<SelectItem>> {
        let mut items = vec![self.select_item()?];
        while self.eat_symbol(",") {
            items.push(self.select_item()?);
        }
        Ok(items)
    }

    fn select_item(&mut self) -> CmisResult<SelectItem> {
        if self.eat_symbol("*") {
            return Ok(SelectItem::All);
        }
        let first = self.identifier()?;
        if self.eat_symbol(".") {
            if self.eat_symbol("*") {
                return Ok(SelectItem::AllOf(first));
            }
            let property = self.identifier()?;
            return Ok(SelectItem::Column(ColumnRef {
                qualifier: Some(first),
                property,
            }));
        }
        Ok(SelectItem::Column(ColumnRef {
            qualifier: None,
            property: first,
        }))
    }

    fn type_ref(&mut self) -> CmisResult<TypeRef> {
        let name = self.identifier()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.identifier()?)
        } else if matches!(self.peek(), Some(Token::Ident(word)) if !is_reserved(word)) {
            Some(self.identifier()?)
        } else {
            None
        };
        Ok(TypeRef { name, alias })
    }

    fn join_clause(&mut self) -> CmisResult<TypeRef> {
        let joined = self.type_ref()?;
        self.expect_keyword("ON")?;
        let left = self.column()?;
        self.expect_symbol("=")?;
        let right = self.column()?;
        if left.property != property_ids::OBJECT_ID || right.property != property_ids::OBJECT_ID {
            return Err(syntax("joins are only supported on cmis:objectId"));
        }
        Ok(joined)
    }

    fn column(&mut self) -> CmisResult<ColumnRef> {
        let first = self.identifier()?;
        if self.eat_symbol(".") {
            let property = self.identifier()?;
            return Ok(ColumnRef {
                qualifier: Some(first),
                property,
            });
        }
        Ok(ColumnRef {
            qualifier: None,
            property: first,
        })
    }

    fn predicate(&mut self) -> CmisResult<Predicate> {
        for (keyword, kind) in [
            ("IN_FOLDER", FolderPredicate::InFolder),
            ("IN_TREE", FolderPredicate::InTree),
            ("CONTAINS", FolderPredicate::Contains),
        ] {
            if self.eat_keyword(keyword) {
                return self.function_predicate(kind);
            }
        }

        let column = self.column()?;
        let op = match self.next() {
            Some(Token::Symbol(symbol)) => match symbol.as_str() {
                "=" => CompareOp::Eq,
                "<>" => CompareOp::NotEq,
                "<" => CompareOp::Lt,
                ">" => CompareOp::Gt,
                "<=" => CompareOp::Le,
                ">=" => CompareOp::Ge,
                other => return Err(syntax(format!("unsupported operator `{other}`"))),
            },
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("LIKE") => CompareOp::Like,
            other => return Err(syntax(format!("expected comparison, found {other:?}"))),
        };
        let value = self.literal()?;
        if op == CompareOp::Like && !matches!(value, Literal::String(_)) {
            return Err(syntax("LIKE needs a string pattern"));
        }
        Ok(Predicate::Compare { column, op, value })
    }

    fn function_predicate(&mut self, kind: FolderPredicate) -> CmisResult<Predicate> {
        self.expect_symbol("(")?;
        let qualifier = if matches!(self.peek(), Some(Token::Ident(_))) {
            let qualifier = self.identifier()?;
            self.expect_symbol(",")?;
            Some(qualifier)
        } else {
            None
        };
        let argument = self.string_literal()?;
        self.expect_symbol(")")?;
        Ok(match kind {
            FolderPredicate::InFolder => Predicate::InFolder {
                qualifier,
                folder_id: argument,
            },
            FolderPredicate::InTree => Predicate::InTree {
                qualifier,
                folder_id: argument,
            },
            FolderPredicate::Contains => Predicate::Contains {
                qualifier,
                text: argument,
            },
        })
    }

    fn literal(&mut self) -> CmisResult<Literal> {
        match self.next() {
            Some(Token::Str(text)) => Ok(Literal::String(text)),
            Some(Token::Number(text)) => {
                if text.contains('.') {
                    text.parse::<f64>()
                        .map(Literal::Decimal)
                        .map_err(|_| syntax(format!("invalid decimal `{text}`")))
                } else {
                    text.parse::<i64>()
                        .map(Literal::Integer)
                        .map_err(|_| syntax(format!("invalid integer `{text}`")))
                }
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("TRUE") => {
                Ok(Literal::Boolean(true))
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("FALSE") => {
                Ok(Literal::Boolean(false))
            }
            other => Err(syntax(format!("expected literal, found {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FolderPredicate {
    InFolder,
    InTree,
    Contains,
}

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "AS", "JOIN", "INNER", "ON", "WHERE", "AND", "OR", "NOT", "ORDER", "BY",
    "ASC", "DESC", "LIKE", "IN_FOLDER", "IN_TREE", "CONTAINS", "TRUE", "FALSE",
];

fn is_reserved(word: &str) -> bool {
    RESERVED
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

fn syntax(message: impl Into<String>) -> CmisError {
    CmisError::InvalidArgument(format!("invalid query: {}", message.into()))
}

#[cfg(test)]
mod tests {
    use super::parse_statement;
    use crate::query::{ColumnRef, CompareOp, Literal, Predicate, SelectItem};

    #[test]
    fn parses_folder_lookup() {
        let statement = parse_statement(
            "SELECT * FROM cmis:folder WHERE cmis:name='O\\'Brien' and IN_FOLDER('f-1')",
        )
        .unwrap();
        assert_eq!(statement.select, vec![SelectItem::All]);
        assert_eq!(statement.from.name, "cmis:folder");
        assert_eq!(
            statement.predicates,
            vec![
                Predicate::Compare {
                    column: ColumnRef {
                        qualifier: None,
                        property: "cmis:name".to_string()
                    },
                    op: CompareOp::Eq,
                    value: Literal::String("O'Brien".to_string()),
                },
                Predicate::InFolder {
                    qualifier: None,
                    folder_id: "f-1".to_string()
                },
            ]
        );
    }

    #[test]
    fn parses_aspect_join_with_aliases() {
        let statement = parse_statement(
            "select d.*, w.* from cmis:document as d join sc:webable as w on d.cmis:objectId = w.cmis:objectId where w.sc:isActive = False order by d.cmis:name desc",
        )
        .unwrap();
        assert_eq!(
            statement.select,
            vec![
                SelectItem::AllOf("d".to_string()),
                SelectItem::AllOf("w".to_string())
            ]
        );
        assert_eq!(statement.from.alias.as_deref(), Some("d"));
        let join = statement.join.clone().unwrap();
        assert_eq!(join.name, "sc:webable");
        assert!(statement.targets_join(Some("w")));
        assert!(!statement.targets_join(Some("d")));
        assert!(statement.order_by.unwrap().descending);
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for statement in [
            "DELETE FROM cmis:document",
            "SELECT * FROM cmis:document WHERE cmis:name = 'a' OR cmis:name = 'b'",
            "SELECT * FROM cmis:document d JOIN sc:webable w ON d.cmis:name = w.cmis:name",
            "SELECT * FROM cmis:document WHERE cmis:name LIKE 3",
            "SELECT * FROM cmis:document WHERE cmis:name = 'unterminated",
        ] {
            let err = parse_statement(statement).unwrap_err();
            assert_eq!(err.code(), "INVALID_ARGUMENT", "{statement}");
        }
    }

    #[test]
    fn parses_contains_and_numbers() {
        let statement = parse_statement(
            "SELECT cmis:objectId FROM cmis:document WHERE CONTAINS('alfresco') AND cmis:contentStreamLength >= 10",
        )
        .unwrap();
        assert_eq!(statement.predicates.len(), 2);
        assert!(matches!(
            &statement.predicates[1],
            Predicate::Compare { op: CompareOp::Ge, value: Literal::Integer(10), .. }
        ));
    }
}
