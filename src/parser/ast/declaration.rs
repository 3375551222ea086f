use std::fmt;

use crate::parser::ast::{OrderBy, ScalarExpr, SelectItem, SelectQuery};
use crate::parser::{Cursor, ParseError};

/// Body of a projection declaration: the `SELECT` between the parentheses.
/// Only the clauses a projection may carry are representable.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProjectionSelect {
    pub select: Vec<SelectItem>,
    pub group_by: Vec<ScalarExpr>,
    pub order_by: Vec<OrderBy>,
}

impl ProjectionSelect {
    pub fn parse(cursor: &mut Cursor) -> Result<ProjectionSelect, ParseError> {
        if !cursor.take_keyword("select") {
            return ParseError::new("expected SELECT", cursor.position, cursor).err();
        }
        let mut select = Vec::new();
        loop {
            select.push(SelectItem::parse(cursor)?);
            cursor.next_non_whitespace();
            if cursor.current() == ',' {
                cursor.next();
            } else {
                break;
            }
        }

        let mut group_by = Vec::new();
        if cursor.take_keyword("group") {
            if !cursor.take_keyword("by") {
                return ParseError::new("expected BY after GROUP", cursor.position, cursor).err();
            }
            loop {
                group_by.push(ScalarExpr::parse(cursor)?);
                cursor.next_non_whitespace();
                if cursor.current() == ',' {
                    cursor.next();
                } else {
                    break;
                }
            }
        }

        let mut order_by = Vec::new();
        if cursor.take_keyword("order") {
            if !cursor.take_keyword("by") {
                return ParseError::new("expected BY after ORDER", cursor.position, cursor).err();
            }
            loop {
                order_by.push(OrderBy::parse(cursor)?);
                cursor.next_non_whitespace();
                if cursor.current() == ',' {
                    cursor.next();
                } else {
                    break;
                }
            }
        }

        Ok(ProjectionSelect { select, group_by, order_by })
    }

    /// Expand into a full query over the implicit source table. The order by
    /// clause is carried along so the canonical text survives.
    pub fn to_select_query(&self) -> SelectQuery {
        SelectQuery {
            select: self.select.clone(),
            where_clause: None,
            group_by: self.group_by.clone(),
            order_by: self.order_by.clone(),
        }
    }
}

impl fmt::Display for ProjectionSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY ")?;
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", expr)?;
            }
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY ")?;
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", order)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ProjectionSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectionSelect({})", self)
    }
}

/// A named projection declaration: `name (SELECT ...)`.
///
/// `Display` renders the canonical one-line form; parsing that form back
/// yields an equal declaration, so the text doubles as a stable identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProjectionDeclaration {
    pub name: String,
    pub query: ProjectionSelect,
}

impl ProjectionDeclaration {
    pub fn parse(cursor: &mut Cursor) -> Result<ProjectionDeclaration, ParseError> {
        let name = cursor.parse_identifier()?;
        cursor.expect_char('(')?;
        let query = ProjectionSelect::parse(cursor)?;
        cursor.expect_char(')')?;
        Ok(ProjectionDeclaration { name, query })
    }

    pub fn parse_str(text: &str) -> Result<ProjectionDeclaration, ParseError> {
        let mut cursor = Cursor::new(text);
        let declaration = ProjectionDeclaration::parse(&mut cursor)?;
        cursor.next_non_whitespace();
        if !cursor.eof() {
            return ParseError::new(
                "unexpected trailing text after declaration",
                cursor.position,
                &cursor,
            )
            .err();
        }
        Ok(declaration)
    }
}

impl fmt::Display for ProjectionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.query)
    }
}

impl fmt::Debug for ProjectionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectionDeclaration({})", self)
    }
}

/// Parse a comma-separated list of declarations. Empty input yields an empty
/// list.
pub fn parse_declaration_list(text: &str) -> Result<Vec<ProjectionDeclaration>, ParseError> {
    let mut cursor = Cursor::new(text);
    cursor.next_non_whitespace();
    let mut declarations = Vec::new();
    if cursor.eof() {
        return Ok(declarations);
    }
    loop {
        declarations.push(ProjectionDeclaration::parse(&mut cursor)?);
        cursor.next_non_whitespace();
        if cursor.current() == ',' {
            cursor.next();
        } else if cursor.eof() {
            return Ok(declarations);
        } else {
            return ParseError::new(
                "expected ',' between declarations",
                cursor.position,
                &cursor,
            )
            .err();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_text_round_trips() {
        let texts = [
            "by_kind (SELECT kind, count() GROUP BY kind)",
            "ordered (SELECT id, event_date ORDER BY event_date, id DESC)",
            "p (SELECT min(event_date) AS first_day)",
        ];
        for text in texts {
            let declaration = ProjectionDeclaration::parse_str(text).unwrap();
            assert_eq!(declaration.to_string(), text);
            let reparsed = ProjectionDeclaration::parse_str(&declaration.to_string()).unwrap();
            assert_eq!(reparsed, declaration);
        }
    }

    #[test]
    fn whitespace_is_not_identity() {
        let a = ProjectionDeclaration::parse_str("p (SELECT   kind,count()   GROUP BY kind)")
            .unwrap();
        let b = ProjectionDeclaration::parse_str("p (SELECT kind, count() GROUP BY kind)").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn list_parsing() {
        assert!(parse_declaration_list("").unwrap().is_empty());
        assert!(parse_declaration_list("   ").unwrap().is_empty());

        let list = parse_declaration_list(
            "a (SELECT id ORDER BY id), b (SELECT kind, count() GROUP BY kind)",
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "a");
        assert_eq!(list[1].name, "b");
    }

    #[test]
    fn rejects_malformed_declarations() {
        assert!(ProjectionDeclaration::parse_str("p SELECT id").is_err());
        assert!(ProjectionDeclaration::parse_str("p (SELECT id").is_err());
        assert!(ProjectionDeclaration::parse_str("p (SELECT)").is_err());
        assert!(ProjectionDeclaration::parse_str("p (SELECT id) trailing").is_err());
    }
}
