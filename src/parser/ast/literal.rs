use std::fmt;

use ordered_float::NotNan;
use serde_json::Value;

use crate::parser::{Cursor, ParseError};

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(NotNan<f64>),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Int(i) => Value::Number(serde_json::Number::from(*i)),
            Literal::Float(f) => serde_json::Number::from_f64(f.into_inner())
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }

    /// Lift a scalar value back into a literal. `None` for values with no
    /// literal form (NaN, nested values).
    pub fn from_value(value: &Value) -> Option<Literal> {
        match value {
            Value::Null => Some(Literal::Null),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Literal::Int(i))
                } else {
                    n.as_f64().and_then(|f| NotNan::new(f).ok()).map(Literal::Float)
                }
            }
            Value::String(s) => Some(Literal::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_number_start(cursor: &Cursor) -> bool {
        let c = cursor.current();
        c.is_ascii_digit() || c == '-'
    }

    pub fn is_string_delimiter(cursor: &Cursor) -> bool {
        matches!(cursor.current(), '\'' | '"')
    }

    pub fn parse_number(cursor: &mut Cursor) -> Result<Literal, ParseError> {
        let pivot = cursor.position;
        if cursor.current() == '-' {
            cursor.next();
        }
        let mut has_dot = false;
        while !cursor.eof() {
            let c = cursor.current();
            if c.is_ascii_digit() {
                cursor.next();
            } else if c == '.' && !has_dot {
                has_dot = true;
                cursor.next();
            } else {
                break;
            }
        }
        let text = cursor.text_from_range(pivot, cursor.position);
        if has_dot {
            let parsed: f64 = text
                .parse()
                .map_err(|_| ParseError::new("invalid number", pivot, cursor))?;
            let value = NotNan::new(parsed)
                .map_err(|_| ParseError::new("invalid number", pivot, cursor))?;
            Ok(Literal::Float(value))
        } else {
            text.parse()
                .map(Literal::Int)
                .map_err(|_| ParseError::new("invalid number", pivot, cursor))
        }
    }

    /// Quoted string; a doubled quote inside the string escapes itself.
    pub fn parse_string(cursor: &mut Cursor) -> Result<Literal, ParseError> {
        let pivot = cursor.position;
        let delimiter = cursor.current();
        cursor.next();
        let mut out = String::new();
        while !cursor.eof() {
            let c = cursor.current();
            if c == delimiter {
                cursor.next();
                if cursor.current() == delimiter {
                    out.push(delimiter);
                    cursor.next();
                    continue;
                }
                return Ok(Literal::String(out));
            }
            out.push(c);
            cursor.next();
        }
        ParseError::new("unterminated string literal", pivot, cursor).err()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(n) => {
                let v = n.into_inner();
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(_) => write!(f, "String({})", self),
            Literal::Int(_) => write!(f, "Int({})", self),
            Literal::Float(_) => write!(f, "Float({})", self),
            Literal::Bool(_) => write!(f, "Bool({})", self),
            Literal::Null => write!(f, "Null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_parsing() {
        let mut cursor = Cursor::new("42");
        assert_eq!(Literal::parse_number(&mut cursor).unwrap(), Literal::Int(42));

        let mut cursor = Cursor::new("-7");
        assert_eq!(Literal::parse_number(&mut cursor).unwrap(), Literal::Int(-7));

        let mut cursor = Cursor::new("2.5");
        assert_eq!(
            Literal::parse_number(&mut cursor).unwrap(),
            Literal::Float(NotNan::new(2.5).unwrap())
        );
    }

    #[test]
    fn string_parsing_with_escapes() {
        let mut cursor = Cursor::new("'it''s'");
        assert_eq!(
            Literal::parse_string(&mut cursor).unwrap(),
            Literal::String("it's".to_string())
        );
    }

    #[test]
    fn display_round_trips_whole_floats() {
        let lit = Literal::Float(NotNan::new(2.0).unwrap());
        assert_eq!(lit.to_string(), "2.0");
        let mut cursor = Cursor::new("2.0");
        assert_eq!(Literal::parse_number(&mut cursor).unwrap(), lit);
    }

    #[test]
    fn value_conversion() {
        assert_eq!(Literal::Int(3).to_value(), json!(3));
        assert_eq!(Literal::from_value(&json!("a")), Some(Literal::String("a".into())));
        assert_eq!(Literal::from_value(&json!([1])), None);
    }
}
