use std::fmt;

use crate::executor::aggregates::AggregateRegistry;
use crate::parser::ast::{Function, Literal};
use crate::parser::{Cursor, ParseError};

/// Closed set of scalar expression shapes: literal, column reference or
/// function call. Expressions are value trees; `Clone` is a deep copy and no
/// node is ever shared between independently owned expressions.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ScalarExpr {
    Literal(Literal),
    Column(String),
    Function(Function),
}

impl ScalarExpr {
    pub fn column(name: &str) -> ScalarExpr {
        ScalarExpr::Column(name.to_string())
    }

    pub fn call(name: &str, args: Vec<ScalarExpr>) -> ScalarExpr {
        ScalarExpr::Function(Function { name: name.to_string(), args })
    }

    /// Canonical text of the expression, used as the name of the output
    /// column it produces.
    pub fn column_name(&self) -> String {
        self.to_string()
    }

    /// Collect referenced column names in occurrence order (duplicates kept;
    /// callers deduplicate).
    pub fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            ScalarExpr::Literal(_) => {}
            ScalarExpr::Column(name) => out.push(name.clone()),
            ScalarExpr::Function(f) => {
                for arg in &f.args {
                    arg.collect_columns(out);
                }
            }
        }
    }

    /// True when the expression reads no column at all.
    pub fn is_constant(&self) -> bool {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns.is_empty()
    }

    /// True when this is a call to a registered aggregate function.
    pub fn is_aggregate_call(&self, registry: &AggregateRegistry) -> bool {
        matches!(self, ScalarExpr::Function(f) if registry.get(&f.name).is_some())
    }

    pub fn contains_aggregate(&self, registry: &AggregateRegistry) -> bool {
        match self {
            ScalarExpr::Literal(_) | ScalarExpr::Column(_) => false,
            ScalarExpr::Function(f) => {
                registry.get(&f.name).is_some()
                    || f.args.iter().any(|a| a.contains_aggregate(registry))
            }
        }
    }

    pub fn parse(cursor: &mut Cursor) -> Result<ScalarExpr, ParseError> {
        cursor.next_non_whitespace();
        if cursor.eof() {
            return ParseError::new("expected expression", cursor.position, cursor).err();
        }

        if Literal::is_number_start(cursor) {
            return Literal::parse_number(cursor).map(ScalarExpr::Literal);
        }
        if Literal::is_string_delimiter(cursor) {
            return Literal::parse_string(cursor).map(ScalarExpr::Literal);
        }
        if cursor.at_keyword("true") {
            cursor.take_keyword("true");
            return Ok(ScalarExpr::Literal(Literal::Bool(true)));
        }
        if cursor.at_keyword("false") {
            cursor.take_keyword("false");
            return Ok(ScalarExpr::Literal(Literal::Bool(false)));
        }
        if cursor.at_keyword("null") {
            cursor.take_keyword("null");
            return Ok(ScalarExpr::Literal(Literal::Null));
        }

        let name = cursor.parse_identifier()?;
        // a call site must follow its name immediately
        if cursor.current() == '(' {
            cursor.next();
            let mut args = Vec::new();
            cursor.next_non_whitespace();
            if cursor.current() == ')' {
                cursor.next();
                return Ok(ScalarExpr::call(&name, args));
            }
            loop {
                args.push(ScalarExpr::parse(cursor)?);
                cursor.next_non_whitespace();
                match cursor.current() {
                    ',' => cursor.next(),
                    ')' => {
                        cursor.next();
                        return Ok(ScalarExpr::call(&name, args));
                    }
                    _ => {
                        return ParseError::new(
                            "expected ',' or ')' in argument list",
                            cursor.position,
                            cursor,
                        )
                        .err()
                    }
                }
            }
        }
        Ok(ScalarExpr::Column(name))
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Literal(l) => write!(f, "{}", l),
            ScalarExpr::Column(c) => write!(f, "{}", c),
            ScalarExpr::Function(fun) => write!(f, "{}", fun),
        }
    }
}

impl fmt::Debug for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Literal(_) => write!(f, "Literal({})", self),
            ScalarExpr::Column(_) => write!(f, "Column({})", self),
            ScalarExpr::Function(_) => write!(f, "Function({})", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::aggregates::default_aggregates;

    fn parse(text: &str) -> ScalarExpr {
        let mut cursor = Cursor::new(text);
        ScalarExpr::parse(&mut cursor).expect("expression should parse")
    }

    #[test]
    fn parses_columns_and_calls() {
        assert_eq!(parse("event_date"), ScalarExpr::column("event_date"));
        assert_eq!(
            parse("min(event_date)"),
            ScalarExpr::call("min", vec![ScalarExpr::column("event_date")])
        );
        assert_eq!(parse("count()"), ScalarExpr::call("count", vec![]));
        assert_eq!(
            parse("modulo(id, 8)"),
            ScalarExpr::call(
                "modulo",
                vec![ScalarExpr::column("id"), ScalarExpr::Literal(Literal::Int(8))]
            )
        );
    }

    #[test]
    fn canonical_text_round_trips() {
        for text in ["min(event_date)", "count()", "modulo(id, 8)", "tuple(a, b)"] {
            assert_eq!(parse(text).to_string(), text);
        }
    }

    #[test]
    fn nested_calls() {
        let expr = parse("min(modulo(id, 2))");
        let mut columns = Vec::new();
        expr.collect_columns(&mut columns);
        assert_eq!(columns, vec!["id"]);
    }

    #[test]
    fn aggregate_detection() {
        let registry = default_aggregates();
        assert!(parse("min(a)").is_aggregate_call(&registry));
        assert!(!parse("modulo(a, 2)").is_aggregate_call(&registry));
        assert!(parse("equals(min(a), 1)").contains_aggregate(&registry));
        assert!(!parse("a").contains_aggregate(&registry));
    }

    #[test]
    fn constant_detection() {
        assert!(parse("1").is_constant());
        assert!(parse("equals(1, 2)").is_constant());
        assert!(!parse("equals(a, 2)").is_constant());
    }
}
