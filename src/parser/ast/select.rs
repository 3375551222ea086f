use std::fmt;

use crate::parser::ast::ScalarExpr;
use crate::parser::{Cursor, ParseError};

/// One entry of a select list, optionally aliased with `AS`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SelectItem {
    pub expr: ScalarExpr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn expr(expr: ScalarExpr) -> SelectItem {
        SelectItem { expr, alias: None }
    }

    /// Name of the output column this item produces.
    pub fn output_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expr.column_name(),
        }
    }

    pub fn parse(cursor: &mut Cursor) -> Result<SelectItem, ParseError> {
        let expr = ScalarExpr::parse(cursor)?;
        let alias = if cursor.take_keyword("as") {
            Some(cursor.parse_identifier()?)
        } else {
            None
        };
        Ok(SelectItem { expr, alias })
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.expr, alias),
            None => write!(f, "{}", self.expr),
        }
    }
}

impl fmt::Debug for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SelectItem({})", self)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub expr: ScalarExpr,
    pub ascending: bool,
}

impl OrderBy {
    pub fn parse(cursor: &mut Cursor) -> Result<OrderBy, ParseError> {
        let expr = ScalarExpr::parse(cursor)?;
        let ascending = if cursor.take_keyword("desc") {
            false
        } else {
            cursor.take_keyword("asc");
            true
        };
        Ok(OrderBy { expr, ascending })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ascending {
            write!(f, "{}", self.expr)
        } else {
            write!(f, "{} DESC", self.expr)
        }
    }
}

impl fmt::Debug for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderBy({})", self)
    }
}

/// In-memory form of one `SELECT` over a single implicit source table.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SelectQuery {
    pub select: Vec<SelectItem>,
    pub where_clause: Option<ScalarExpr>,
    pub group_by: Vec<ScalarExpr>,
    pub order_by: Vec<OrderBy>,
}

impl SelectQuery {
    pub fn new(select: Vec<SelectItem>) -> SelectQuery {
        SelectQuery { select, where_clause: None, group_by: Vec::new(), order_by: Vec::new() }
    }

    pub fn set_where(&mut self, expr: ScalarExpr) {
        self.where_clause = Some(expr);
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        if let Some(expr) = &self.where_clause {
            write!(f, " WHERE {}", expr)?;
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

impl fmt::Debug for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SelectQuery({})", self)
    }
}
